//! Session authenticator: login, bearer verification, refresh, and
//! password change orchestration.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tidings_core::Clock;
use tidings_core::error::{TidingsError, TidingsResult};
use tidings_core::models::account::Account;
use tidings_core::models::role::Role;
use tidings_core::repository::AccountRepository;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::{Argon2Credentials, CredentialStore};
use crate::throttle::{LoginThrottle, ThrottleState};
use crate::token::{ClaimSet, SessionClaims, SigningKey, TokenCodec, TokenKind};

/// Successful login result.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Successful refresh result.
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// A verified bearer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub account_id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub password_epoch: u64,
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            account_id: claims.sub,
            display_name: claims.name,
            role: claims.role,
            password_epoch: claims.epoch,
        }
    }
}

/// Outcome of a password change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChange {
    Changed { password_epoch: u64 },
    Rejected(PasswordRejection),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordRejection {
    #[error("current password is incorrect")]
    WrongCurrentPassword,

    #[error("new password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("new password must differ from the current one")]
    Unchanged,
}

/// Authentication service.
///
/// Generic over the account repository so the auth layer has no
/// dependency on any storage crate.
pub struct AuthService<A: AccountRepository, C: CredentialStore = Argon2Credentials> {
    accounts: A,
    credentials: C,
    codec: TokenCodec,
    throttle: LoginThrottle,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl<A: AccountRepository, C: CredentialStore> AuthService<A, C> {
    pub fn new(
        accounts: A,
        credentials: C,
        key: SigningKey,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(key, config.jwt_issuer.clone(), Arc::clone(&clock)),
            throttle: LoginThrottle::from_config(&config),
            accounts,
            credentials,
            config,
            clock,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate with username + password and issue a token pair.
    ///
    /// Every refusal (unknown account, locked, wrong password) performs
    /// one password verification and the same failure delay, so they are
    /// indistinguishable from outside.
    pub async fn login(&self, username: &str, password: &str) -> TidingsResult<TokenPair> {
        // 1. Look up account.
        let account = match self.accounts.find_by_username(username).await {
            Ok(account) => account,
            Err(TidingsError::NotFound { .. }) => {
                self.credentials.verify_dummy(password);
                warn!(username, "login refused: unknown account");
                return Err(self.refuse(AuthError::UnknownAccount).await);
            }
            Err(e) => return Err(e),
        };

        // 2. Lock check. Account state alone decides.
        let now = self.clock.now();
        if let ThrottleState::Locked { until } = self.throttle.state(&account.security, now) {
            self.credentials.verify_dummy(password);
            warn!(account_id = %account.id, locked_until = %until, "login refused: account locked");
            return Err(self.refuse(AuthError::AccountLocked).await);
        }

        // 3. Verify password.
        if !self.credentials.verify(password, &account.password_hash)? {
            let throttle = self.throttle;
            let state = self
                .accounts
                .record_failed_login(account.id, move |s| throttle.on_failure(s, now))
                .await?;
            warn!(
                account_id = %account.id,
                failed_attempts = state.failed_attempts,
                locked = state.is_locked_at(now),
                "login refused: wrong password"
            );
            return Err(self.refuse(AuthError::InvalidCredentials).await);
        }

        // 4. Clear throttle state.
        if self.throttle.needs_reset(&account.security) {
            self.accounts.record_successful_login(account.id).await?;
        }

        // 5. Issue tokens.
        let pair = self.issue_pair(&account)?;
        info!(account_id = %account.id, role = %account.role(), "login succeeded");
        Ok(pair)
    }

    /// Verify an access token presented as a bearer credential.
    ///
    /// Beyond the signature and expiry, the token's password epoch must
    /// still match the account's: a password change invalidates every
    /// outstanding session without a revocation list.
    pub async fn verify_bearer(&self, token: &str) -> TidingsResult<Identity> {
        let claims = self
            .decode(token, TokenKind::Access)
            .map_err(|e| refused("verify_bearer", e))?;

        let current = match self.accounts.current_password_epoch(claims.sub).await {
            Ok(epoch) => epoch,
            Err(TidingsError::NotFound { .. }) => {
                return Err(refused("verify_bearer", AuthError::UnknownAccount));
            }
            Err(e) => return Err(e),
        };
        if current != claims.epoch {
            return Err(refused("verify_bearer", AuthError::StaleSession));
        }

        Ok(claims.into())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Role and epoch are re-read from the account, since either may have
    /// changed since the refresh token was issued.
    pub async fn refresh(&self, refresh_token: &str) -> TidingsResult<AccessGrant> {
        let claims = self
            .decode(refresh_token, TokenKind::Refresh)
            .map_err(|e| refused("refresh", e))?;

        let account = match self.accounts.find_by_id(claims.sub).await {
            Ok(account) => account,
            Err(TidingsError::NotFound { .. }) => {
                return Err(refused("refresh", AuthError::UnknownAccount));
            }
            Err(e) => return Err(e),
        };
        if account.security.password_epoch != claims.epoch {
            return Err(refused("refresh", AuthError::StaleSession));
        }

        let access = self
            .codec
            .issue(&claim_set(&account, TokenKind::Access), self.config.access_token_ttl())?;
        debug!(account_id = %account.id, "access token refreshed");

        Ok(AccessGrant {
            access_token: access.token,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Change an account's password.
    ///
    /// Success advances the password epoch, which invalidates every token
    /// issued before it, and clears any throttle state.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> TidingsResult<PasswordChange> {
        let account = self.accounts.find_by_id(account_id).await?;

        if !self
            .credentials
            .verify(current_password, &account.password_hash)?
        {
            warn!(%account_id, "password change refused: wrong current password");
            return Ok(PasswordChange::Rejected(
                PasswordRejection::WrongCurrentPassword,
            ));
        }
        if new_password.chars().count() < self.config.min_password_length {
            return Ok(PasswordChange::Rejected(PasswordRejection::TooShort {
                min: self.config.min_password_length,
            }));
        }
        if new_password == current_password {
            return Ok(PasswordChange::Rejected(PasswordRejection::Unchanged));
        }

        let hash = self.credentials.hash(new_password)?;
        let password_epoch = self.accounts.change_password(account_id, hash).await?;
        info!(%account_id, password_epoch, "password changed; outstanding sessions invalidated");

        Ok(PasswordChange::Changed { password_epoch })
    }

    fn decode(&self, token: &str, expected: TokenKind) -> Result<SessionClaims, AuthError> {
        let claims = self.codec.verify(token)?;
        if claims.kind != expected {
            return Err(AuthError::WrongTokenKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }

    fn issue_pair(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let access = self.codec.issue(
            &claim_set(account, TokenKind::Access),
            self.config.access_token_ttl(),
        )?;
        let refresh = self.codec.issue(
            &claim_set(account, TokenKind::Refresh),
            self.config.refresh_token_ttl(),
        )?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    async fn refuse(&self, err: AuthError) -> TidingsError {
        let delay = self.config.failure_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        err.into()
    }
}

fn claim_set(account: &Account, kind: TokenKind) -> ClaimSet {
    ClaimSet {
        subject_id: account.id,
        display_name: account.display_name.clone(),
        role: account.role(),
        password_epoch: account.security.password_epoch,
        kind,
    }
}

fn refused(operation: &'static str, err: AuthError) -> TidingsError {
    debug!(operation, reason = %err, "token refused");
    err.into()
}
