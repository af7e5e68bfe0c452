//! Password hashing with bcrypt.
//!
//! Stored hashes are standard `$2b$` strings, so they carry their own salt
//! and cost and stay verifiable if [`HASH_COST`] is raised later.

/// bcrypt work factor for new passwords.
pub const HASH_COST: u32 = 10;

/// Hashes `password` with a fresh random salt.
///
/// # Errors
///
/// Returns [`bcrypt::BcryptError`] if the hash cannot be computed.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, HASH_COST)
}

/// Checks `password` against a stored hash. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    match bcrypt::verify(password, stored) {
        Ok(matches) => matches,
        Err(e) => {
            log::warn!("Unreadable password hash: {e}");
            false
        }
    }
}
