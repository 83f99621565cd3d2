//! One-time passcode issuance and single-use verification.
//!
//! Codes are 6-digit, drawn uniformly from 100000–999999, and stored only as
//! Argon2 hashes keyed by email. Issuing a code upserts over any pending code
//! for the same email, so at most one live code exists per address.
//! Consumption is a conditional delete on `(email, code_hash)`: when two
//! verify calls race, exactly one observes the deleted row.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use sqlx::{PgPool, Row};
use tracing::Instrument;

/// Result of a verification attempt. Callers branch on every variant, so this
/// is a tagged outcome rather than an error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched, was live, and has been consumed.
    Ok,
    /// Code did not match; the pending record is left in place for a retry.
    InvalidCode,
    /// Code matched but the validity window had passed; the record is gone.
    Expired,
    /// No pending code for this email, or a concurrent attempt consumed it.
    NoPendingCode,
}

fn generate_code() -> String {
    rand::rngs::OsRng.gen_range(100_000..=999_999).to_string()
}

fn hash_code(code: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|err| anyhow!("Failed to hash passcode: {err}"))?;
    Ok(hash.to_string())
}

fn code_matches(code: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(code.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Issue a fresh code for `email`, superseding any pending one.
///
/// Returns the plaintext exactly once for out-of-band delivery; only the hash
/// is persisted.
///
/// # Errors
/// Returns an error if hashing or the database write fails.
pub async fn issue(pool: &PgPool, email: &str, ttl_seconds: i64) -> Result<String> {
    let code = generate_code();
    let code_hash = hash_code(&code)?;

    // Upsert keeps at most one live code per email; a stale code must never
    // verify once a newer one exists. Racing issues cannot collide on the
    // primary key: both writes succeed and the later one wins.
    let query = r"
        INSERT INTO otp_codes (email, code_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ON CONFLICT (email)
        DO UPDATE SET code_hash = EXCLUDED.code_hash,
                      issued_at = NOW(),
                      expires_at = EXCLUDED.expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(&code_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to issue otp")?;

    Ok(code)
}

/// Verify a submitted code and consume it on success or expiry.
///
/// A failed guess leaves the record in place so the user can retry within the
/// validity window. The consuming delete is keyed on the exact stored hash:
/// if a concurrent call already consumed the row, zero rows are affected and
/// the outcome degrades to [`VerifyOutcome::NoPendingCode`], so a code can
/// never verify twice.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn verify(pool: &PgPool, email: &str, supplied: &str) -> Result<VerifyOutcome> {
    let query = r"
        SELECT code_hash, (expires_at <= NOW()) AS expired
        FROM otp_codes
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch pending otp")?;

    let Some(row) = row else {
        return Ok(VerifyOutcome::NoPendingCode);
    };

    let code_hash: String = row.get("code_hash");
    let expired: bool = row.get("expired");

    if !code_matches(supplied, &code_hash) {
        return Ok(VerifyOutcome::InvalidCode);
    }

    let query = "DELETE FROM otp_codes WHERE email = $1 AND code_hash = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let deleted = sqlx::query(query)
        .bind(email)
        .bind(&code_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to consume otp")?;

    if deleted.rows_affected() == 0 {
        // Lost the race: another verify (or a reissue) removed this record.
        return Ok(VerifyOutcome::NoPendingCode);
    }

    if expired {
        return Ok(VerifyOutcome::Expired);
    }

    Ok(VerifyOutcome::Ok)
}
