//! Notification publisher: compute a user's snapshot once, fan it out to
//! every live connection of that user.
//!
//! Delivery is best-effort and at-most-once. A connection that cannot take
//! the snapshot is pruned from the registry and told to close; the rest of
//! the fan-out carries on. Concurrent pushes for the same user are not
//! ordered against each other, which is fine because every snapshot is
//! the whole state.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tidings_core::error::TidingsResult;
use tidings_core::repository::ActivityRepository;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::ConnectionHandle;
use crate::error::PushResult;
use crate::registry::ConnectionRegistry;
use crate::snapshot::Snapshot;

/// Result of pushing to one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub delivered: usize,
    pub pruned: usize,
}

/// Result of a broadcast across users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Unique users pushed to.
    pub users: usize,
    pub delivered: usize,
    pub pruned: usize,
    /// Users whose snapshot could not be computed.
    pub failed_users: usize,
}

pub struct NotificationPublisher<S: ActivityRepository> {
    activity: S,
    registry: Arc<ConnectionRegistry>,
}

impl<S: ActivityRepository> NotificationPublisher<S> {
    pub fn new(activity: S, registry: Arc<ConnectionRegistry>) -> Self {
        Self { activity, registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Read-only query of the user's unread state.
    pub async fn snapshot_for(&self, user_id: Uuid) -> TidingsResult<Snapshot> {
        let unread = self.activity.unread_count(user_id).await?;
        let last_message = self.activity.latest_item(user_id).await?;
        Ok(Snapshot::new(unread, last_message))
    }

    /// Send a fresh snapshot to a single connection. Used right after a
    /// connection is admitted.
    pub async fn send_snapshot(&self, connection: &ConnectionHandle) -> PushResult<()> {
        let payload = self.snapshot_for(connection.user_id()).await?.to_json()?;
        connection.send(payload)
    }

    /// Push the user's snapshot to all of their connections.
    ///
    /// Per-connection failures never surface as an error; only a failure
    /// to compute the snapshot does.
    pub async fn push_to(&self, user_id: Uuid) -> PushResult<PushOutcome> {
        let connections = self.registry.connections_for(user_id);
        if connections.is_empty() {
            return Ok(PushOutcome::default());
        }

        let payload = self.snapshot_for(user_id).await?.to_json()?;
        let mut outcome = PushOutcome::default();
        for connection in connections {
            match connection.send(payload.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(err) => {
                    warn!(
                        %user_id,
                        connection_id = %connection.id(),
                        error = %err,
                        "push failed; pruning connection"
                    );
                    self.registry.remove(user_id, connection.id());
                    connection.close();
                    outcome.pruned += 1;
                }
            }
        }

        debug!(%user_id, delivered = outcome.delivered, pruned = outcome.pruned, "snapshot pushed");
        Ok(outcome)
    }

    /// Push to each distinct, non-nil user id once.
    pub async fn broadcast<I>(&self, user_ids: I) -> BroadcastReport
    where
        I: IntoIterator<Item = Uuid>,
    {
        let unique: HashSet<Uuid> = user_ids.into_iter().filter(|id| !id.is_nil()).collect();

        let mut report = BroadcastReport::default();
        for user_id in unique {
            report.users += 1;
            match self.push_to(user_id).await {
                Ok(outcome) => {
                    report.delivered += outcome.delivered;
                    report.pruned += outcome.pruned;
                }
                Err(err) => {
                    warn!(%user_id, error = %err, "snapshot unavailable; skipping user");
                    report.failed_users += 1;
                }
            }
        }
        report
    }
}
