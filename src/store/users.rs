//! Account records and credential verification.
//!
//! Passwords are hashed with Argon2id before persisting and stored as
//! PHC-format strings. Verification goes through the argon2 crate's verifier,
//! never a raw string comparison. The `users.email` unique constraint is the
//! authoritative duplicate guard; `exists` only exists to drive a friendlier
//! signup message before the insert races.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

/// An account row. The password field always holds a PHC hash string.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub street: String,
    pub postal: String,
    pub city: String,
    pub verified: bool,
}

/// Profile fields captured at signup alongside the credentials.
#[derive(Debug, Clone)]
pub struct Profile {
    pub full_name: String,
    pub street: String,
    pub postal: String,
    pub city: String,
}

/// Outcome of an account insert; duplicates are a domain outcome, not an error.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Uuid),
    Duplicate,
}

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("Failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash. Malformed hashes count as a
/// mismatch rather than an error so login keeps its single generic failure.
#[must_use]
pub fn verify_credential(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// True if an account with this email exists, verified or not.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn exists(pool: &PgPool, email: &str) -> Result<bool> {
    let query = "SELECT 1 FROM users WHERE email = $1 LIMIT 1";
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
        .context("failed to check for existing user")?;
    Ok(row.is_some())
}

/// Create an unverified account, hashing the password first.
///
/// A unique violation on email maps to [`CreateOutcome::Duplicate`] so a race
/// with a prior `exists` check is tolerated.
///
/// # Errors
/// Returns an error if hashing or the insert fails for any other reason.
pub async fn create(
    pool: &PgPool,
    email: &str,
    password: &str,
    profile: &Profile,
) -> Result<CreateOutcome> {
    let password_hash = hash_password(password)?;

    let query = r"
        INSERT INTO users (email, password_hash, full_name, street, postal, city)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query_as::<_, (Uuid,)>(query)
        .bind(email)
        .bind(&password_hash)
        .bind(&profile.full_name)
        .bind(&profile.street)
        .bind(&profile.postal)
        .bind(&profile.city)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok((id,)) => Ok(CreateOutcome::Created(id)),
        Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Duplicate),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Fetch an account by its exact (case-sensitive) email.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = r"
        SELECT id, email, password_hash, full_name, street, postal, city, verified
        FROM users
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    sqlx::query_as::<_, User>(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user")
}

/// Idempotently flip the account to verified.
///
/// # Errors
/// Returns an error if the database update fails.
pub async fn mark_verified(pool: &PgPool, email: &str) -> Result<()> {
    let query = "UPDATE users SET verified = TRUE WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
