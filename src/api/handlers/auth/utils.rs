//! Small helpers for signup validation and session token handling.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Basic email format check.
pub(super) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Format rules for signup fields: password at least 6 characters, postal
/// code exactly 5, everything else non-empty.
pub(super) fn user_details_are_valid(
    email: &str,
    password: &str,
    full_name: &str,
    street: &str,
    postal: &str,
    city: &str,
) -> bool {
    valid_email(email)
        && password.trim().len() >= 6
        && postal.trim().len() == 5
        && !full_name.trim().is_empty()
        && !street.trim().is_empty()
        && !city.trim().is_empty()
}

/// The confirmation field must repeat the email exactly.
pub(super) fn email_is_confirmed(email: &str, confirm_email: &str) -> bool {
    email == confirm_email
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(super) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
pub(super) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
