//! Account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::role::Role;

/// Privilege flags as stored on the account record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags {
    pub moderator: bool,
    pub admin: bool,
    pub super_admin: bool,
}

/// The part of an account the login throttle and token verification
/// care about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// Incremented on every password change. Tokens carry the epoch they
    /// were issued under and die when it moves.
    pub password_epoch: u64,
}

impl SecurityState {
    /// A lock only counts while `locked_until` is still in the future.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub flags: AccountFlags,
    pub security: SecurityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn role(&self) -> Role {
        Role::from_flags(&self.flags)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub username: String,
    pub display_name: String,
    /// Already-hashed password (PHC string).
    pub password_hash: String,
    pub flags: AccountFlags,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn lock_expires_at_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let state = SecurityState {
            failed_attempts: 5,
            locked_until: Some(now + Duration::minutes(30)),
            password_epoch: 0,
        };
        assert!(state.is_locked_at(now));
        assert!(!state.is_locked_at(now + Duration::minutes(30)));
        assert!(!SecurityState::default().is_locked_at(now));
    }
}
