//! Integration tests for the OTP and credential stores.
//!
//! These run against a real Postgres instance. Set `VETRINA_TEST_DSN` to a
//! database the tests may write to; when unset, every test skips.
//!
//! Covered properties:
//! - a consumed code can never verify twice, even under concurrency;
//! - a failed guess does not consume the pending code;
//! - expiry consumes the code on the next attempt;
//! - reissuing invalidates the prior code;
//! - the signup -> verify -> login credential path end to end.

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use ulid::Ulid;
use vetrina::store::{
    otp::{self, VerifyOutcome},
    users::{self, CreateOutcome, Profile},
};

const TTL: i64 = 600;

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(dsn) = env::var("VETRINA_TEST_DSN") else {
        eprintln!("VETRINA_TEST_DSN not set; skipping");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(5).connect(&dsn).await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(Some(pool))
}

fn unique_email() -> String {
    format!("{}@example.com", Ulid::new().to_string().to_lowercase())
}

fn profile() -> Profile {
    Profile {
        full_name: "Alice Rossi".to_string(),
        street: "Via Roma 1".to_string(),
        postal: "10121".to_string(),
        city: "Turin".to_string(),
    }
}

#[tokio::test]
async fn correct_code_verifies_once() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    let code = otp::issue(&pool, &email, TTL).await?;
    assert_eq!(otp::verify(&pool, &email, &code).await?, VerifyOutcome::Ok);

    // Single-use: the same code must not verify a second time.
    assert_eq!(
        otp::verify(&pool, &email, &code).await?,
        VerifyOutcome::NoPendingCode
    );
    Ok(())
}

#[tokio::test]
async fn wrong_code_does_not_consume() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    let code = otp::issue(&pool, &email, TTL).await?;
    let wrong = if code == "100000" { "100001" } else { "100000" };

    assert_eq!(
        otp::verify(&pool, &email, wrong).await?,
        VerifyOutcome::InvalidCode
    );
    // The pending code survives a failed guess.
    assert_eq!(otp::verify(&pool, &email, &code).await?, VerifyOutcome::Ok);
    Ok(())
}

#[tokio::test]
async fn expired_code_is_consumed_on_attempt() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    // Zero TTL puts the expiry at issuance time.
    let code = otp::issue(&pool, &email, 0).await?;
    assert_eq!(
        otp::verify(&pool, &email, &code).await?,
        VerifyOutcome::Expired
    );
    assert_eq!(
        otp::verify(&pool, &email, &code).await?,
        VerifyOutcome::NoPendingCode
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_verifies_yield_single_ok() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    let code = otp::issue(&pool, &email, TTL).await?;

    let (first, second) = tokio::join!(
        otp::verify(&pool, &email, &code),
        otp::verify(&pool, &email, &code)
    );
    let outcomes = [first?, second?];

    let oks = outcomes
        .iter()
        .filter(|outcome| **outcome == VerifyOutcome::Ok)
        .count();
    assert_eq!(oks, 1, "exactly one concurrent verify may succeed");
    assert!(outcomes.contains(&VerifyOutcome::NoPendingCode));
    Ok(())
}

#[tokio::test]
async fn reissue_invalidates_prior_code() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    let old_code = otp::issue(&pool, &email, TTL).await?;
    let new_code = otp::issue(&pool, &email, TTL).await?;
    if old_code == new_code {
        // Collisions are possible in a 900k space; nothing to assert then.
        return Ok(());
    }

    assert_ne!(
        otp::verify(&pool, &email, &old_code).await?,
        VerifyOutcome::Ok
    );
    assert_eq!(
        otp::verify(&pool, &email, &new_code).await?,
        VerifyOutcome::Ok
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_issues_both_succeed() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    // Both writes land on the same primary key; neither may surface an error.
    let (first, second) = tokio::join!(
        otp::issue(&pool, &email, TTL),
        otp::issue(&pool, &email, TTL)
    );
    let (first, second) = (first?, second?);

    // Whichever write won, exactly one live code remains.
    let first_ok = otp::verify(&pool, &email, &first).await? == VerifyOutcome::Ok;
    let second_ok = if first_ok {
        false
    } else {
        otp::verify(&pool, &email, &second).await? == VerifyOutcome::Ok
    };
    assert!(first_ok || second_ok);
    assert_eq!(
        otp::verify(&pool, &email, &first).await?,
        VerifyOutcome::NoPendingCode
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_is_rejected_by_the_store() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    assert!(!users::exists(&pool, &email).await?);
    let outcome = users::create(&pool, &email, "secret1", &profile()).await?;
    assert!(matches!(outcome, CreateOutcome::Created(_)));
    assert!(users::exists(&pool, &email).await?);

    let outcome = users::create(&pool, &email, "other-password", &profile()).await?;
    assert!(matches!(outcome, CreateOutcome::Duplicate));
    Ok(())
}

#[tokio::test]
async fn mark_verified_is_idempotent() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    users::create(&pool, &email, "secret1", &profile()).await?;
    users::mark_verified(&pool, &email).await?;
    users::mark_verified(&pool, &email).await?;

    let user = users::find_by_email(&pool, &email)
        .await?
        .expect("user should exist");
    assert!(user.verified);
    Ok(())
}

#[tokio::test]
async fn signup_verify_login_credential_path() -> Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let email = unique_email();

    users::create(&pool, &email, "secret1", &profile()).await?;
    let user = users::find_by_email(&pool, &email)
        .await?
        .expect("user should exist");
    assert!(!user.verified);
    assert!(user.password_hash.starts_with("$argon2id$"));

    let code = otp::issue(&pool, &email, TTL).await?;
    assert_eq!(otp::verify(&pool, &email, &code).await?, VerifyOutcome::Ok);
    users::mark_verified(&pool, &email).await?;

    let user = users::find_by_email(&pool, &email)
        .await?
        .expect("user should exist");
    assert!(user.verified);
    assert!(users::verify_credential("secret1", &user.password_hash));
    assert!(!users::verify_credential("wrong", &user.password_hash));
    Ok(())
}
