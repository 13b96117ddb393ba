//! Push gateway: the lifecycle of a single long-lived connection.
//!
//! ```text
//! handshake ──fail──▶ close 1008, nothing registered
//!     │
//!     ok
//!     ▼
//! register ─▶ initial snapshot ─▶ idle loop ─▶ teardown
//! ```
//!
//! The idle loop waits on three things at once: a close request from
//! elsewhere in the process, queued outbound snapshots, and inbound
//! traffic from the peer. Whichever way it ends, the connection leaves the
//! registry exactly once.

use std::sync::Arc;

use tidings_auth::password::CredentialStore;
use tidings_auth::service::{AuthService, Identity};
use tidings_core::error::{TidingsError, TidingsResult};
use tidings_core::repository::{AccountRepository, ActivityRepository};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PushConfig;
use crate::connection::{ConnectionHandle, ConnectionMailbox};
use crate::error::{PushError, PushResult};
use crate::publisher::NotificationPublisher;
use crate::registry::ConnectionRegistry;

/// WebSocket close codes the gateway uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    GoingAway,
    PolicyViolation,
    InternalError,
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::PolicyViolation => 1008,
            CloseCode::InternalError => 1011,
        }
    }
}

/// A frame received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong,
    Close,
}

/// Bidirectional message channel to one peer.
pub trait PushTransport: Send {
    /// Next inbound frame. `None` means the peer went away without a close
    /// frame.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Inbound, PushError>>> + Send;

    fn send_text(&mut self, payload: String) -> impl Future<Output = PushResult<()>> + Send;

    /// Send a close frame. Errors are swallowed; the peer may already be
    /// gone.
    fn close(&mut self, code: CloseCode, reason: &'static str) -> impl Future<Output = ()> + Send;
}

/// Turns a bearer token into an identity.
pub trait BearerVerifier: Send + Sync {
    fn verify_bearer(&self, token: &str) -> impl Future<Output = TidingsResult<Identity>> + Send;
}

impl<A: AccountRepository, C: CredentialStore> BearerVerifier for AuthService<A, C> {
    async fn verify_bearer(&self, token: &str) -> TidingsResult<Identity> {
        AuthService::verify_bearer(self, token).await
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Handshake refused; the connection was never registered.
    Rejected,
    /// The peer closed or dropped the connection.
    PeerClosed,
    /// Closed from inside the process, e.g. after a password change.
    Disconnected,
    IdleTimeout,
    Failed(PushError),
}

impl SessionEnd {
    pub fn cause(&self) -> &'static str {
        match self {
            SessionEnd::Rejected => "rejected",
            SessionEnd::PeerClosed => "peer_closed",
            SessionEnd::Disconnected => "disconnected",
            SessionEnd::IdleTimeout => "idle_timeout",
            SessionEnd::Failed(_) => "failed",
        }
    }
}

/// Removes the connection from the registry when dropped, so a cancelled
/// session task cannot leave a stale entry behind.
struct Registration<'a> {
    registry: &'a ConnectionRegistry,
    handle: Arc<ConnectionHandle>,
}

impl<'a> Registration<'a> {
    fn admit(registry: &'a ConnectionRegistry, handle: Arc<ConnectionHandle>) -> Self {
        registry.add(Arc::clone(&handle));
        Self { registry, handle }
    }

    fn release(&self) -> bool {
        self.handle.close();
        self.registry
            .remove(self.handle.user_id(), self.handle.id())
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct PushGateway<V: BearerVerifier, S: ActivityRepository> {
    verifier: Arc<V>,
    registry: Arc<ConnectionRegistry>,
    publisher: Arc<NotificationPublisher<S>>,
    config: PushConfig,
}

impl<V: BearerVerifier, S: ActivityRepository> PushGateway<V, S> {
    /// The gateway registers connections in the publisher's registry.
    pub fn new(verifier: Arc<V>, publisher: Arc<NotificationPublisher<S>>, config: PushConfig) -> Self {
        let registry = Arc::clone(publisher.registry());
        Self {
            verifier,
            registry,
            publisher,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Run one connection from handshake to teardown.
    pub async fn serve<T: PushTransport>(&self, token: &str, mut transport: T) -> SessionEnd {
        let identity = match self.verifier.verify_bearer(token).await {
            Ok(identity) => identity,
            Err(err) => {
                let code = match err {
                    TidingsError::AuthenticationFailed => CloseCode::PolicyViolation,
                    _ => CloseCode::InternalError,
                };
                debug!(error = %err, code = code.as_u16(), "push handshake refused");
                transport.close(code, "authentication failed").await;
                return SessionEnd::Rejected;
            }
        };

        let (handle, mut mailbox) =
            ConnectionHandle::open(identity.account_id, self.config.outbound_buffer);
        let registration = Registration::admit(&self.registry, Arc::clone(&handle));
        info!(
            user_id = %identity.account_id,
            connection_id = %handle.id(),
            role = %identity.role,
            "push connection admitted"
        );

        let end = match self.publisher.send_snapshot(&handle).await {
            Ok(()) => self.pump(&mut transport, &mut mailbox).await,
            Err(err) => SessionEnd::Failed(err),
        };

        self.teardown(&registration, &mut transport, &end).await;
        end
    }

    async fn pump<T: PushTransport>(
        &self,
        transport: &mut T,
        mailbox: &mut ConnectionMailbox,
    ) -> SessionEnd {
        let idle = self.config.idle_timeout();
        let mut deadline = idle.map(|limit| Instant::now() + limit);

        loop {
            tokio::select! {
                biased;

                _ = mailbox.closed.cancelled() => return SessionEnd::Disconnected,

                Some(payload) = mailbox.outbound.recv() => {
                    if let Err(err) = transport.send_text(payload).await {
                        return SessionEnd::Failed(err);
                    }
                }

                inbound = transport.recv() => match inbound {
                    None | Some(Ok(Inbound::Close)) => return SessionEnd::PeerClosed,
                    Some(Err(err)) => return SessionEnd::Failed(err),
                    Some(Ok(_)) => {
                        if let Some(limit) = idle {
                            deadline = Some(Instant::now() + limit);
                        }
                    }
                },

                _ = idle_deadline(deadline) => return SessionEnd::IdleTimeout,
            }
        }
    }

    async fn teardown<T: PushTransport>(
        &self,
        registration: &Registration<'_>,
        transport: &mut T,
        end: &SessionEnd,
    ) {
        let removed = registration.release();
        let handle = &registration.handle;

        match end {
            SessionEnd::Failed(err) => {
                warn!(
                    user_id = %handle.user_id(),
                    connection_id = %handle.id(),
                    error = %err,
                    "push connection failed"
                );
                transport.close(CloseCode::InternalError, "internal error").await;
            }
            SessionEnd::Disconnected => transport.close(CloseCode::Normal, "session ended").await,
            SessionEnd::IdleTimeout => transport.close(CloseCode::Normal, "idle timeout").await,
            SessionEnd::PeerClosed | SessionEnd::Rejected => {}
        }

        info!(
            user_id = %handle.user_id(),
            connection_id = %handle.id(),
            cause = end.cause(),
            age_ms = handle.age().as_millis() as u64,
            removed,
            "push connection closed"
        );
    }
}

async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
