//! Tidings Auth — password verification, signed session tokens, login
//! throttling, and the session authenticator that ties them together.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod throttle;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use password::{Argon2Credentials, CredentialStore};
pub use service::{AccessGrant, AuthService, Identity, PasswordChange, PasswordRejection, TokenPair};
pub use throttle::{LoginThrottle, ThrottleState};
pub use token::{ClaimSet, InvalidToken, SessionClaims, SigningKey, TokenCodec, TokenKind};
