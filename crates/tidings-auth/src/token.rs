//! Signed session tokens.
//!
//! Tokens are HS256 JWTs signed with a process-wide secret. They are
//! stateless: nothing is stored server-side, and a token dies either at
//! its `exp` or when the account's password epoch moves past the one it
//! carries (checked by the authenticator, not here).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tidings_core::Clock;
use tidings_core::models::role::Role;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuthError;

/// Minimum accepted length of a configured signing secret.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived; authorizes ordinary requests and push connections.
    Access,
    /// Long-lived; only exchangeable for a new access token.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        })
    }
}

/// The subject-level claims a caller asks to have signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    pub subject_id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub password_epoch: u64,
    pub kind: TokenKind,
}

/// JWT claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account ID).
    pub sub: Uuid,
    /// Display name at issue time.
    pub name: String,
    pub role: Role,
    /// Password epoch at issue time.
    pub epoch: u64,
    pub kind: TokenKind,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
}

impl SessionClaims {
    pub fn claim_set(&self) -> ClaimSet {
        ClaimSet {
            subject_id: self.sub,
            display_name: self.name.clone(),
            role: self.role,
            password_epoch: self.epoch,
            kind: self.kind,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Why a token failed verification. Verification failure is an expected
/// outcome, so this is a plain value rather than an [`AuthError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidToken {
    #[error("signature mismatch")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("unexpected issuer")]
    WrongIssuer,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Process-wide HMAC signing key.
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    fingerprint: String,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSigningKey {
                min: MIN_SECRET_LEN,
            });
        }
        let digest = Sha256::digest(secret);
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            fingerprint: hex::encode(&digest[..8]),
        })
    }

    /// Random key for non-production use. Every token issued under it
    /// becomes unverifiable when the process restarts.
    pub fn ephemeral() -> Self {
        let mut secret = [0u8; 64];
        rand::rng().fill(&mut secret[..]);
        let key = Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            fingerprint: hex::encode(&Sha256::digest(secret)[..8]),
        };
        warn!(
            fingerprint = %key.fingerprint,
            "NO SIGNING KEY CONFIGURED: generated an ephemeral key; all sessions \
             will be invalidated on restart. Do not run like this in production."
        );
        key
    }

    /// Resolve the signing key at startup. A missing secret is fatal
    /// unless `allow_ephemeral` is set.
    pub fn from_config(secret: Option<&str>, allow_ephemeral: bool) -> Result<Self, AuthError> {
        match secret {
            Some(secret) => {
                let key = Self::from_secret(secret.as_bytes())?;
                info!(fingerprint = %key.fingerprint, "Loaded token signing key");
                Ok(key)
            }
            None if allow_ephemeral => Ok(Self::ephemeral()),
            None => Err(AuthError::MissingSigningKey),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// A freshly signed token and its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Encodes and verifies session tokens.
pub struct TokenCodec {
    key: SigningKey,
    issuer: String,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(key: SigningKey, issuer: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);
        // Expiry is checked against the injected clock instead.
        validation.validate_exp = false;

        Self {
            key,
            issuer,
            validation,
            clock,
        }
    }

    /// Sign `claims` with `exp = now + ttl`.
    pub fn issue(&self, claims: &ClaimSet, ttl: Duration) -> Result<IssuedToken, AuthError> {
        let now = self.clock.now();
        let expires_at = now + ttl;
        let session = SessionClaims {
            sub: claims.subject_id,
            name: claims.display_name.clone(),
            role: claims.role,
            epoch: claims.password_epoch,
            kind: claims.kind,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &session, &self.key.encoding)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: session.expires_at().unwrap_or(expires_at),
        })
    }

    /// Check signature, shape, issuer and expiry. A token is expired from
    /// the instant `exp` is reached.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, InvalidToken> {
        let claims = jsonwebtoken::decode::<SessionClaims>(token, &self.key.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => InvalidToken::BadSignature,
                ErrorKind::InvalidIssuer => InvalidToken::WrongIssuer,
                _ => InvalidToken::Malformed(e.to_string()),
            })?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(InvalidToken::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tidings_core::ManualClock;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn codec(clock: &ManualClock) -> TokenCodec {
        TokenCodec::new(
            SigningKey::from_secret(SECRET).unwrap(),
            "tidings-test",
            Arc::new(clock.clone()),
        )
    }

    fn claims(kind: TokenKind) -> ClaimSet {
        ClaimSet {
            subject_id: Uuid::new_v4(),
            display_name: "Alice".into(),
            role: Role::Moderator,
            password_epoch: 3,
            kind,
        }
    }

    #[test]
    fn jwt_roundtrip() {
        let clock = ManualClock::new(start());
        let codec = codec(&clock);
        let input = claims(TokenKind::Access);

        let issued = codec.issue(&input, Duration::minutes(15)).unwrap();
        let decoded = codec.verify(&issued.token).unwrap();

        assert_eq!(decoded.claim_set(), input);
        assert_eq!(decoded.iss, "tidings-test");
        assert_eq!(issued.expires_at, start() + Duration::minutes(15));
    }

    #[test]
    fn expiry_boundary_is_invalid() {
        let clock = ManualClock::new(start());
        let codec = codec(&clock);
        let issued = codec
            .issue(&claims(TokenKind::Refresh), Duration::seconds(60))
            .unwrap();

        clock.advance(Duration::seconds(59));
        assert!(codec.verify(&issued.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(codec.verify(&issued.token).unwrap_err(), InvalidToken::Expired);

        clock.advance(Duration::days(1));
        assert_eq!(codec.verify(&issued.token).unwrap_err(), InvalidToken::Expired);
    }

    #[test]
    fn jti_is_unique() {
        let clock = ManualClock::new(start());
        let codec = codec(&clock);
        let input = claims(TokenKind::Access);

        let t1 = codec.issue(&input, Duration::minutes(1)).unwrap();
        let t2 = codec.issue(&input, Duration::minutes(1)).unwrap();
        assert_ne!(
            codec.verify(&t1.token).unwrap().jti,
            codec.verify(&t2.token).unwrap().jti
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let clock = ManualClock::new(start());
        let codec = codec(&clock);
        let issued = codec
            .issue(&claims(TokenKind::Access), Duration::minutes(1))
            .unwrap();

        let tampered = format!("{}x", issued.token);
        assert!(codec.verify(&tampered).is_err());
        assert!(matches!(
            codec.verify("not.a.jwt").unwrap_err(),
            InvalidToken::Malformed(_)
        ));
    }

    #[test]
    fn other_key_is_rejected() {
        let clock = ManualClock::new(start());
        let issued = codec(&clock)
            .issue(&claims(TokenKind::Access), Duration::minutes(1))
            .unwrap();

        let other = TokenCodec::new(
            SigningKey::from_secret(b"ffffffffffffffffffffffffffffffff").unwrap(),
            "tidings-test",
            Arc::new(clock.clone()),
        );
        assert_eq!(other.verify(&issued.token).unwrap_err(), InvalidToken::BadSignature);
    }

    #[test]
    fn other_issuer_is_rejected() {
        let clock = ManualClock::new(start());
        let issued = codec(&clock)
            .issue(&claims(TokenKind::Access), Duration::minutes(1))
            .unwrap();

        let other = TokenCodec::new(
            SigningKey::from_secret(SECRET).unwrap(),
            "someone-else",
            Arc::new(clock.clone()),
        );
        assert_eq!(other.verify(&issued.token).unwrap_err(), InvalidToken::WrongIssuer);
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(matches!(
            SigningKey::from_secret(b"short").unwrap_err(),
            AuthError::WeakSigningKey { .. }
        ));
    }

    #[test]
    fn missing_secret_is_fatal_unless_ephemeral_allowed() {
        assert!(matches!(
            SigningKey::from_config(None, false).unwrap_err(),
            AuthError::MissingSigningKey
        ));

        let a = SigningKey::from_config(None, true).unwrap();
        let b = SigningKey::from_config(None, true).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
