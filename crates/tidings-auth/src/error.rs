//! Authentication error types.

use thiserror::Error;
use tidings_core::error::TidingsError;

use crate::token::{InvalidToken, TokenKind};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unknown account")]
    UnknownAccount,

    #[error("account is locked")]
    AccountLocked,

    #[error("invalid token: {0}")]
    TokenInvalid(#[from] InvalidToken),

    #[error("expected a {expected} token, got {found}")]
    WrongTokenKind {
        expected: TokenKind,
        found: TokenKind,
    },

    #[error("token was issued before the last password change")]
    StaleSession,

    #[error("no signing key configured")]
    MissingSigningKey,

    #[error("signing key must be at least {min} bytes")]
    WeakSigningKey { min: usize },

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl AuthError {
    /// Expected refusals, as opposed to faults.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::UnknownAccount
                | AuthError::AccountLocked
                | AuthError::TokenInvalid(_)
                | AuthError::WrongTokenKind { .. }
                | AuthError::StaleSession
        )
    }
}

impl From<AuthError> for TidingsError {
    fn from(err: AuthError) -> Self {
        if err.is_refusal() {
            return TidingsError::AuthenticationFailed;
        }
        match err {
            AuthError::Crypto(msg) => TidingsError::Crypto(msg),
            other => TidingsError::Internal(other.to_string()),
        }
    }
}
