// Utility helpers shared by handlers and services

use crate::{
    constants::ERROR_BODY_EXCERPT_CHARS,
    error::{AppError, Result},
};

/// Trims `value` and rejects it when empty.
pub fn require_non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Minimal shape check for payer emails; the processors do the real validation.
pub fn validate_email(email: &str) -> Result<&str> {
    let email = require_non_empty(email, "userEmail")?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid email address: {}", email)));
    }
    Ok(email)
}

/// Path-segment ids coming from callers must not smuggle extra path parts.
pub fn validate_path_id<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let id = require_non_empty(value, field)?;
    if id.contains('/') || id.contains('?') || id.contains('#') || id.contains("..") {
        return Err(AppError::BadRequest(format!("Invalid {}", field)));
    }
    Ok(id)
}

pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(ERROR_BODY_EXCERPT_CHARS).collect();
    format!("{}...", cut)
}

pub fn random_hex(bytes: usize) -> String {
    let raw: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    hex::encode(raw)
}
