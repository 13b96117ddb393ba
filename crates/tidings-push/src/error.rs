//! Push error types.

use thiserror::Error;
use tidings_core::error::TidingsError;

use crate::connection::ConnectionId;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    #[error("outbound buffer for connection {0} is full")]
    OutboundFull(ConnectionId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("snapshot query failed: {0}")]
    Snapshot(#[from] TidingsError),
}

impl From<PushError> for TidingsError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::Snapshot(inner) => inner,
            other => TidingsError::Internal(other.to_string()),
        }
    }
}

pub type PushResult<T> = Result<T, PushError>;
