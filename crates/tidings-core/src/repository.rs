//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Each method is assumed to be
//! atomic at the storage layer; in particular the login bookkeeping
//! methods perform their read-modify-write without interleaving.

use uuid::Uuid;

use crate::error::TidingsResult;
use crate::models::{
    account::{Account, SecurityState},
    activity::MessageSummary,
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait AccountRepository: Send + Sync {
    /// Returns [`TidingsError::NotFound`](crate::TidingsError::NotFound)
    /// when no account has this username.
    fn find_by_username(&self, username: &str)
    -> impl Future<Output = TidingsResult<Account>> + Send;

    fn find_by_id(&self, id: Uuid) -> impl Future<Output = TidingsResult<Account>> + Send;

    fn current_password_epoch(&self, id: Uuid) -> impl Future<Output = TidingsResult<u64>> + Send;

    /// Apply `transition` to the account's security state and persist the
    /// result, returning the new state.
    fn record_failed_login<F>(
        &self,
        id: Uuid,
        transition: F,
    ) -> impl Future<Output = TidingsResult<SecurityState>> + Send
    where
        F: FnOnce(&SecurityState) -> SecurityState + Send;

    /// Clear `failed_attempts` and `locked_until`.
    fn record_successful_login(&self, id: Uuid) -> impl Future<Output = TidingsResult<()>> + Send;

    /// Store a new password hash, advance `password_epoch`, and clear any
    /// throttle state. Returns the new epoch.
    fn change_password(
        &self,
        id: Uuid,
        password_hash: String,
    ) -> impl Future<Output = TidingsResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

pub trait ActivityRepository: Send + Sync {
    fn unread_count(&self, user_id: Uuid) -> impl Future<Output = TidingsResult<u64>> + Send;

    fn latest_item(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TidingsResult<Option<MessageSummary>>> + Send;
}
