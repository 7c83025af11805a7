//! Password hashing and account field rules
//!
//! Hashes are Argon2id in PHC string format, so parameters and salt travel
//! with the stored value.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 150;

/// Well-formed Argon2id hash with default parameters that no password matches;
/// verified against for unknown usernames so lookups cost the same
pub const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| format!("Failed to hash password: {}", e))
}

/// Verify a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Usernames: 1 to 150 letters, digits and `@.+-_`
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required.".to_string());
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username must be at most {} characters.",
            MAX_USERNAME_LEN
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(
            "Username may contain only letters, digits and @/./+/-/_ characters.".to_string(),
        );
    }
    Ok(())
}

/// Minimum length, not purely numeric, not the username itself
pub fn validate_password(password: &str, username: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LEN
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password cannot be entirely numeric.".to_string());
    }
    if password.eq_ignore_ascii_case(username) {
        return Err("Password is too similar to the username.".to_string());
    }
    Ok(())
}
