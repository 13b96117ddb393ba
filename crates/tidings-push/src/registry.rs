//! Connection registry: user id → that user's live push connections.
//!
//! A pure address book. It knows nothing about authentication or
//! payloads; it only answers "is this user reachable, and where". One user
//! may hold many connections at once (tabs, devices). A user whose last
//! connection is removed disappears from the map entirely, so the map
//! never holds an empty set.
//!
//! All mutation goes through a single mutex that is never held across an
//! await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::connection::{ConnectionHandle, ConnectionId};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: Mutex<HashMap<Uuid, Vec<Arc<ConnectionHandle>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<Arc<ConnectionHandle>>>> {
        // The map is always left consistent, so a panic elsewhere while
        // holding the lock does not invalidate it.
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection under its user. Adding the same connection
    /// twice is a no-op.
    pub fn add(&self, connection: Arc<ConnectionHandle>) {
        let mut users = self.lock();
        let entries = users.entry(connection.user_id()).or_default();
        if entries.iter().any(|c| c.id() == connection.id()) {
            return;
        }
        debug!(
            user_id = %connection.user_id(),
            connection_id = %connection.id(),
            user_connections = entries.len() + 1,
            "push connection registered"
        );
        entries.push(connection);
    }

    /// Remove one connection. Returns `true` only for the call that
    /// actually removed it; repeated calls and unknown ids are no-ops.
    pub fn remove(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let mut users = self.lock();
        let Some(entries) = users.get_mut(&user_id) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|c| c.id() != connection_id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            users.remove(&user_id);
        }

        if removed {
            debug!(%user_id, %connection_id, "push connection unregistered");
        }
        removed
    }

    /// Total live connections across all users.
    pub fn count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Number of users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.lock().contains_key(&user_id)
    }

    /// Snapshot of a user's connections. Sending happens on the copy, so
    /// the lock is not held while pushing.
    pub fn connections_for(&self, user_id: Uuid) -> Vec<Arc<ConnectionHandle>> {
        self.lock().get(&user_id).cloned().unwrap_or_default()
    }

    /// Signal every connection of `user_id` to close. Each connection's
    /// gateway task performs its own teardown, which unregisters it.
    /// Returns how many connections were signalled.
    pub fn disconnect_user(&self, user_id: Uuid) -> usize {
        let connections = self.connections_for(user_id);
        for connection in &connections {
            connection.close();
        }
        connections.len()
    }
}
