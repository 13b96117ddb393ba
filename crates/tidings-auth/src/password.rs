//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::Rng;

use crate::error::AuthError;

/// One-way salted password hashing, as consumed by the authenticator.
pub trait CredentialStore: Send + Sync {
    /// Hash a plaintext password into a PHC string.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
    /// `Err(AuthError::Crypto)` if the stored hash is malformed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;

    /// Spend the same effort as [`verify`](Self::verify) against a hash
    /// no password matches. Used on refusal paths that never reach a real
    /// credential, so they cost the same as a wrong password.
    fn verify_dummy(&self, password: &str);
}

/// Argon2id credential store.
///
/// If a pepper is configured it is prepended to the password before
/// hashing and verification.
#[derive(Clone)]
pub struct Argon2Credentials {
    argon2: Argon2<'static>,
    pepper: Option<String>,
    dummy_hash: String,
}

impl Argon2Credentials {
    /// OWASP ASVS recommended parameters: m=19456 (19 MiB), t=2, p=1.
    pub fn new(pepper: Option<String>) -> Result<Self, AuthError> {
        let params = argon2::Params::new(19456, 2, 1, None)
            .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
        Self::with_params(pepper, params)
    }

    pub fn with_params(pepper: Option<String>, params: argon2::Params) -> Result<Self, AuthError> {
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let mut store = Self {
            argon2,
            pepper,
            dummy_hash: String::new(),
        };

        // Hash of a random secret nobody knows, with the same parameters
        // as real hashes.
        let secret: [u8; 32] = rand::rng().random();
        store.dummy_hash = store.hash(&hex::encode(secret))?;
        Ok(store)
    }

    fn peppered<'a>(&self, password: &'a str, buf: &'a mut String) -> &'a [u8] {
        match &self.pepper {
            Some(p) => {
                *buf = format!("{p}{password}");
                buf.as_bytes()
            }
            None => password.as_bytes(),
        }
    }
}

impl CredentialStore for Argon2Credentials {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let mut buf = String::new();
        let input = self.peppered(password, &mut buf);

        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = self
            .argon2
            .hash_password(input, &salt)
            .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let mut buf = String::new();
        let input = self.peppered(password, &mut buf);

        let parsed_hash = argon2::PasswordHash::new(hash)
            .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(input, &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
        }
    }

    fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}
