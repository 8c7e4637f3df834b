use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            AppError::Password(e.to_string())
        })
}

/// Returns `false` for a wrong password and for a stored value that is not
/// a PHC string.
pub fn verify_password(provided: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Stored password hash is not a valid PHC string: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(provided.as_bytes(), &parsed)
        .is_ok()
}

/// Amount typed into the add or edit form. Must be a finite, non-negative
/// number; surrounding whitespace is ignored.
pub fn validate_amount(raw: &str) -> Result<f64, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(AppError::InvalidAmount),
    }
}

/// Lenient amount parsing for stored values: anything that is not a finite
/// number is 0.
pub fn parse_amount(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}
