//! Code submission: consume the OTP and flip the account to verified.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::flash::{flash_and_redirect, flash_payload, form_state};
use super::session::{ensure_session, redirect_to};
use super::state::AuthConfig;
use super::types::VerifyRequest;
use super::utils::hash_session_token;
use crate::store::{otp, otp::VerifyOutcome, users};

const INVALID_CODE_MESSAGE: &str = "Invalid code. Please try again.";
const EXPIRED_MESSAGE: &str = "The code has expired. Log in again to request a new one.";
const NO_PENDING_MESSAGE: &str = "Account does not exist or is already verified.";

const VERIFY_FORM_FIELDS: &[&str] = &["error_message", "email", "otp"];

/// Serve the verify form state: pending flash data or blank defaults.
#[utoipa::path(
    get,
    path = "/verify",
    responses(
        (status = 200, description = "Verify form state", content_type = "application/json")
    ),
    tag = "auth"
)]
pub async fn verify_form(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    form_state(&headers, &pool, VERIFY_FORM_FIELDS).await
}

#[utoipa::path(
    post,
    path = "/verify",
    request_body = VerifyRequest,
    responses(
        (status = 303, description = "Redirect: /login once verified, /verify with flash data otherwise"),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthConfig>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let request: VerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let (token, set_cookie) = match ensure_session(&headers, &auth_state) {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to establish session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
    };
    let session_hash = hash_session_token(&token);

    let echoed = [
        ("email", request.email.as_str()),
        ("otp", request.otp.as_str()),
    ];

    match otp::verify(&pool, &request.email, &request.otp).await {
        Ok(VerifyOutcome::Ok) => {
            // The code was consumed; flipping the flag is idempotent.
            if let Err(err) = users::mark_verified(&pool, &request.email).await {
                error!("Failed to mark user verified: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Verification failed".to_string(),
                )
                    .into_response();
            }
            redirect_to("/login", set_cookie)
        }
        Ok(VerifyOutcome::InvalidCode) => {
            let payload = flash_payload(INVALID_CODE_MESSAGE, echoed);
            flash_and_redirect(&pool, &session_hash, &payload, "/verify", set_cookie).await
        }
        Ok(VerifyOutcome::Expired) => {
            let payload = flash_payload(EXPIRED_MESSAGE, echoed);
            flash_and_redirect(&pool, &session_hash, &payload, "/verify", set_cookie).await
        }
        Ok(VerifyOutcome::NoPendingCode) => {
            let payload = flash_payload(NO_PENDING_MESSAGE, echoed);
            flash_and_redirect(&pool, &session_hash, &payload, "/verify", set_cookie).await
        }
        Err(err) => {
            error!("Failed to verify code: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn verify_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let auth_state = Arc::new(AuthConfig::new("http://localhost:8080".to_string()));
        let response = verify(HeaderMap::new(), Extension(pool), Extension(auth_state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_form_without_cookie_returns_defaults() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_form(HeaderMap::new(), Extension(pool))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
