//! Shared application state handed to every handler.

use std::sync::Arc;

use tidings_auth::{Argon2Credentials, AuthService, CredentialStore, SigningKey};
use tidings_core::SystemClock;
use tidings_core::error::TidingsResult;
use tidings_core::memory::{InMemoryAccountRepository, InMemoryActivityRepository};
use tidings_core::models::account::{Account, AccountFlags, CreateAccount};
use tidings_push::{ConnectionRegistry, NotificationPublisher, PushGateway};
use tracing::info;

use crate::config::{DemoUser, ServerConfig};

pub type Auth = AuthService<InMemoryAccountRepository>;
pub type Publisher = NotificationPublisher<InMemoryActivityRepository>;
pub type Gateway = PushGateway<Auth, InMemoryActivityRepository>;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub accounts: InMemoryAccountRepository,
    pub publisher: Arc<Publisher>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn build(config: &ServerConfig, key: SigningKey) -> TidingsResult<Self> {
        let credentials = Argon2Credentials::new(config.auth.pepper.clone())?;
        let accounts = InMemoryAccountRepository::new();
        let auth = Arc::new(AuthService::new(
            accounts.clone(),
            credentials,
            key,
            config.auth.clone(),
            Arc::new(SystemClock),
        ));

        let activity = InMemoryActivityRepository::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let publisher = Arc::new(NotificationPublisher::new(activity, registry));
        let gateway = Arc::new(PushGateway::new(
            Arc::clone(&auth),
            Arc::clone(&publisher),
            config.push.clone(),
        ));

        Ok(Self {
            auth,
            accounts,
            publisher,
            gateway,
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.publisher.registry()
    }

    /// Create the demo account with admin rights.
    pub async fn seed_demo_user(&self, demo: &DemoUser) -> TidingsResult<Account> {
        let password_hash = self.auth.credentials().hash(&demo.password)?;
        let account = self
            .accounts
            .create(CreateAccount {
                username: demo.username.clone(),
                display_name: demo.username.clone(),
                password_hash,
                flags: AccountFlags {
                    admin: true,
                    ..Default::default()
                },
            })
            .await?;
        info!(account_id = %account.id, username = %account.username, "demo account created");
        Ok(account)
    }
}
