//! Shared fixtures for push integration tests: an in-memory transport and
//! a fully wired gateway over in-memory repositories.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tidings_auth::{Argon2Credentials, AuthConfig, AuthService, CredentialStore, SigningKey};
use tidings_core::ManualClock;
use tidings_core::memory::{InMemoryAccountRepository, InMemoryActivityRepository};
use tidings_core::models::account::{Account, AccountFlags, CreateAccount};
use tidings_core::models::activity::MessageSummary;
use tidings_push::{
    CloseCode, ConnectionRegistry, Inbound, NotificationPublisher, PushConfig, PushError,
    PushGateway, PushResult, PushTransport, SessionEnd,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";
const SECRET: &[u8] = b"push-integration-secret-0123456789abcdef";

/// What the server side did to the transport, as seen by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text(String),
    Close(u16),
}

pub struct TestTransport {
    inbound: mpsc::UnboundedReceiver<Result<Inbound, PushError>>,
    events: mpsc::UnboundedSender<Event>,
}

impl PushTransport for TestTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, PushError>> {
        self.inbound.recv().await
    }

    async fn send_text(&mut self, payload: String) -> PushResult<()> {
        self.events
            .send(Event::Text(payload))
            .map_err(|_| PushError::Transport("peer gone".into()))
    }

    async fn close(&mut self, code: CloseCode, _reason: &'static str) {
        let _ = self.events.send(Event::Close(code.as_u16()));
    }
}

/// Client end of a [`TestTransport`].
pub struct Peer {
    inbound: Option<mpsc::UnboundedSender<Result<Inbound, PushError>>>,
    pub events: mpsc::UnboundedReceiver<Event>,
}

pub fn transport_pair() -> (TestTransport, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    (
        TestTransport {
            inbound: in_rx,
            events: ev_tx,
        },
        Peer {
            inbound: Some(in_tx),
            events: ev_rx,
        },
    )
}

impl Peer {
    pub async fn next_event(&mut self) -> Event {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for the server")
            .expect("transport dropped without a close frame")
    }

    pub async fn next_snapshot(&mut self) -> serde_json::Value {
        match self.next_event().await {
            Event::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a snapshot, got {other:?}"),
        }
    }

    pub async fn close_code(&mut self) -> u16 {
        match self.next_event().await {
            Event::Close(code) => code,
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    pub fn send(&self, frame: Inbound) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Make the server's next read fail.
    pub fn fail(&self) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(PushError::Transport("connection reset".into())));
        }
    }

    /// Drop the connection without a close frame.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }
}

pub type Auth = AuthService<InMemoryAccountRepository>;
pub type Gateway = PushGateway<Auth, InMemoryActivityRepository>;

pub struct Harness {
    pub auth: Arc<Auth>,
    pub activity: InMemoryActivityRepository,
    pub publisher: Arc<NotificationPublisher<InMemoryActivityRepository>>,
    pub registry: Arc<ConnectionRegistry>,
    pub gateway: Arc<Gateway>,
    pub alice: Account,
    pub bob: Account,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(PushConfig::default()).await
    }

    pub async fn with_config(push: PushConfig) -> Self {
        let params = argon2::Params::new(1024, 1, 1, None).unwrap();
        let credentials = Argon2Credentials::with_params(None, params).unwrap();

        let accounts = InMemoryAccountRepository::new();
        let mut created = Vec::new();
        for (username, display_name) in [("alice", "Alice"), ("bob", "Bob")] {
            let account = accounts
                .create(CreateAccount {
                    username: username.into(),
                    display_name: display_name.into(),
                    password_hash: credentials.hash(PASSWORD).unwrap(),
                    flags: AccountFlags::default(),
                })
                .await
                .unwrap();
            created.push(account);
        }
        let bob = created.pop().unwrap();
        let alice = created.pop().unwrap();

        let config = AuthConfig {
            failure_delay_ms: 0,
            ..Default::default()
        };
        let auth = Arc::new(AuthService::new(
            accounts,
            credentials,
            SigningKey::from_secret(SECRET).unwrap(),
            config,
            Arc::new(ManualClock::new(Utc::now())),
        ));

        let activity = InMemoryActivityRepository::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let publisher = Arc::new(NotificationPublisher::new(
            activity.clone(),
            Arc::clone(&registry),
        ));
        let gateway = Arc::new(PushGateway::new(
            Arc::clone(&auth),
            Arc::clone(&publisher),
            push,
        ));

        Self {
            auth,
            activity,
            publisher,
            registry,
            gateway,
            alice,
            bob,
        }
    }

    pub async fn token_for(&self, username: &str) -> String {
        self.auth.login(username, PASSWORD).await.unwrap().access_token
    }

    /// Start a session on a background task.
    pub fn connect(&self, token: &str) -> (Peer, JoinHandle<SessionEnd>) {
        let (transport, peer) = transport_pair();
        let gateway = Arc::clone(&self.gateway);
        let token = token.to_owned();
        let session = tokio::spawn(async move { gateway.serve(&token, transport).await });
        (peer, session)
    }

    /// Connect and wait until the initial snapshot has arrived, so the
    /// connection is known to be registered.
    pub async fn connect_ready(&self, token: &str) -> (Peer, JoinHandle<SessionEnd>) {
        let (mut peer, session) = self.connect(token);
        peer.next_snapshot().await;
        (peer, session)
    }

    pub async fn deliver(&self, user_id: Uuid, preview: &str) {
        self.activity
            .deliver(
                user_id,
                MessageSummary {
                    id: Uuid::new_v4(),
                    sender_name: "Bob".into(),
                    preview: preview.into(),
                    created_at: Utc::now(),
                },
            )
            .await;
    }
}
