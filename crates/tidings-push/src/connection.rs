//! Handles to live push connections.
//!
//! A connection is split in two: the [`ConnectionHandle`] is the shared,
//! non-owning address other tasks push to, and the [`ConnectionMailbox`]
//! is owned by the gateway task that actually holds the transport.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PushError, PushResult};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: Uuid,
    outbound: mpsc::Sender<String>,
    closed: CancellationToken,
    opened_at: Instant,
}

/// Receiving half of a connection, owned by its gateway task.
#[derive(Debug)]
pub struct ConnectionMailbox {
    pub outbound: mpsc::Receiver<String>,
    pub closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a connection for `user_id` with room for `buffer` queued
    /// outbound messages.
    pub fn open(user_id: Uuid, buffer: usize) -> (Arc<Self>, ConnectionMailbox) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let closed = CancellationToken::new();
        let handle = Arc::new(Self {
            id: ConnectionId::next(),
            user_id,
            outbound: tx,
            closed: closed.clone(),
            opened_at: Instant::now(),
        });
        (
            handle,
            ConnectionMailbox {
                outbound: rx,
                closed,
            },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }

    /// Queue a payload for delivery without waiting. Fails if the
    /// connection is closed or its buffer is full.
    pub fn send(&self, payload: String) -> PushResult<()> {
        if self.closed.is_cancelled() {
            return Err(PushError::ConnectionClosed(self.id));
        }
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::OutboundFull(self.id),
            TrySendError::Closed(_) => PushError::ConnectionClosed(self.id),
        })
    }

    /// Ask the owning gateway task to close this connection. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
