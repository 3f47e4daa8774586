//! Argon2 password storage. Hashes are PHC strings, so the parameters a
//! hash was made with travel with it.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::warn;
use uuid::Uuid;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| anyhow::anyhow!("hashing password: {e}"))
}

/// True only when `plain` matches `stored`. A stored value that is not a
/// PHC string matches nothing.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(phc) => Argon2::default()
            .verify_password(plain.as_bytes(), &phc)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash does not parse");
            false
        }
    }
}

/// Hash of a random secret nobody knows. Gives OAuth-only accounts a
/// well-formed hash that no credential login can match.
pub fn unusable_password_hash() -> anyhow::Result<String> {
    hash_password(&Uuid::new_v4().to_string())
}
