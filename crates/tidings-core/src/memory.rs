//! In-memory repository implementations.
//!
//! Used by the development server and by every test suite in the
//! workspace. Each repository is a cheap handle around shared state, so
//! clones observe each other's writes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{TidingsError, TidingsResult};
use crate::models::account::{Account, AccountFlags, CreateAccount, SecurityState};
use crate::models::activity::MessageSummary;
use crate::repository::{AccountRepository, ActivityRepository};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountRepository {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, input: CreateAccount) -> TidingsResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.username == input.username) {
            return Err(TidingsError::AlreadyExists {
                entity: "account".into(),
            });
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            username: input.username,
            display_name: input.display_name,
            password_hash: input.password_hash,
            flags: input.flags,
            security: SecurityState::default(),
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    pub async fn set_flags(&self, id: Uuid, flags: AccountFlags) -> TidingsResult<Account> {
        self.modify(id, |account| {
            account.flags = flags;
            account.clone()
        })
        .await
    }

    async fn modify<R>(&self, id: Uuid, f: impl FnOnce(&mut Account) -> R) -> TidingsResult<R> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| TidingsError::not_found("account", id))?;
        account.updated_at = Utc::now();
        Ok(f(account))
    }
}

impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_username(&self, username: &str) -> TidingsResult<Account> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| a.username == username)
            .cloned()
            .ok_or_else(|| TidingsError::not_found("account", format!("username={username}")))
    }

    async fn find_by_id(&self, id: Uuid) -> TidingsResult<Account> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| TidingsError::not_found("account", id))
    }

    async fn current_password_epoch(&self, id: Uuid) -> TidingsResult<u64> {
        self.accounts
            .read()
            .await
            .get(&id)
            .map(|a| a.security.password_epoch)
            .ok_or_else(|| TidingsError::not_found("account", id))
    }

    async fn record_failed_login<F>(&self, id: Uuid, transition: F) -> TidingsResult<SecurityState>
    where
        F: FnOnce(&SecurityState) -> SecurityState + Send,
    {
        self.modify(id, |account| {
            account.security = transition(&account.security);
            account.security.clone()
        })
        .await
    }

    async fn record_successful_login(&self, id: Uuid) -> TidingsResult<()> {
        self.modify(id, |account| {
            account.security.failed_attempts = 0;
            account.security.locked_until = None;
        })
        .await
    }

    async fn change_password(&self, id: Uuid, password_hash: String) -> TidingsResult<u64> {
        self.modify(id, |account| {
            account.password_hash = password_hash;
            account.security.password_epoch += 1;
            account.security.failed_attempts = 0;
            account.security.locked_until = None;
            account.security.password_epoch
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inbox {
    unread: u64,
    latest: Option<MessageSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryActivityRepository {
    inboxes: Arc<RwLock<HashMap<Uuid, Inbox>>>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new unread item for `user_id`.
    pub async fn deliver(&self, user_id: Uuid, summary: MessageSummary) {
        let mut inboxes = self.inboxes.write().await;
        let inbox = inboxes.entry(user_id).or_default();
        inbox.unread += 1;
        inbox.latest = Some(summary);
    }

    pub async fn mark_all_read(&self, user_id: Uuid) {
        if let Some(inbox) = self.inboxes.write().await.get_mut(&user_id) {
            inbox.unread = 0;
        }
    }
}

impl ActivityRepository for InMemoryActivityRepository {
    async fn unread_count(&self, user_id: Uuid) -> TidingsResult<u64> {
        Ok(self
            .inboxes
            .read()
            .await
            .get(&user_id)
            .map_or(0, |inbox| inbox.unread))
    }

    async fn latest_item(&self, user_id: Uuid) -> TidingsResult<Option<MessageSummary>> {
        Ok(self
            .inboxes
            .read()
            .await
            .get(&user_id)
            .and_then(|inbox| inbox.latest.clone()))
    }
}
