//! Tidings Push — the long-lived connection side of the system.
//!
//! - [`ConnectionRegistry`]: who is reachable, and through which
//!   connections.
//! - [`PushGateway`]: admits an authenticated connection, keeps it
//!   registered while it lives, and tears it down on every exit path.
//! - [`NotificationPublisher`]: computes a user's unread snapshot and fans
//!   it out to all of that user's connections.

pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod publisher;
pub mod registry;
pub mod snapshot;

pub use config::PushConfig;
pub use connection::{ConnectionHandle, ConnectionId, ConnectionMailbox};
pub use error::{PushError, PushResult};
pub use gateway::{BearerVerifier, CloseCode, Inbound, PushGateway, PushTransport, SessionEnd};
pub use publisher::{BroadcastReport, NotificationPublisher, PushOutcome};
pub use registry::ConnectionRegistry;
pub use snapshot::Snapshot;
