//! Authentication configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 2_592_000 = 30 days).
    pub refresh_token_lifetime_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum password length accepted by `change_password`.
    pub min_password_length: usize,
    /// Consecutive failed logins before the account locks (default: 5).
    pub max_failed_login_attempts: u32,
    /// Lock duration in seconds (default: 1800 = 30 minutes).
    pub lockout_duration_secs: u64,
    /// Delay added to every refused login, in milliseconds (default: 250).
    pub failure_delay_ms: u64,
}

impl AuthConfig {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_lifetime_secs as i64)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_token_lifetime_secs as i64)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::seconds(self.lockout_duration_secs as i64)
    }

    pub fn failure_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.failure_delay_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 2_592_000,
            jwt_issuer: "tidings".into(),
            pepper: None,
            min_password_length: 12,
            max_failed_login_attempts: 5,
            lockout_duration_secs: 1800,
            failure_delay_ms: 250,
        }
    }
}
