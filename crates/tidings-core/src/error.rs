//! Error types for the Tidings system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TidingsError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    /// Deliberately carries no reason: refusals must not tell a caller
    /// whether the account exists, is locked, or the password was wrong.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TidingsError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type TidingsResult<T> = Result<T, TidingsError>;
