//! Login: credential check, unverified-login resend, session creation.

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
use super::session::{create_session, ensure_session, redirect_to, session_cookie};
use super::state::AuthConfig;
use super::types::LoginRequest;
use super::utils::hash_session_token;
use crate::api::email::{verification_email, Mailer};
use crate::store::{otp, users};

// One message for unknown email and wrong password alike, so the endpoint
// cannot be used to enumerate accounts.
const INVALID_CREDENTIAL_MESSAGE: &str = "Invalid email or password. Please try again.";
const UNVERIFIED_MESSAGE: &str = "Please verify your email first.";

const LOGIN_FORM_FIELDS: &[&str] = &["error_message", "email", "password"];

/// Serve the login form state: pending flash data or blank defaults.
#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login form state", content_type = "application/json")
    ),
    tag = "auth"
)]
pub async fn login_form(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    form_state(&headers, &pool, LOGIN_FORM_FIELDS).await
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 303, description = "Redirect: / with a session cookie on success, \
            /verify for unverified accounts, /login with flash data otherwise"),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthConfig>>,
    mailer: Extension<Arc<Mailer>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let (token, set_cookie) = match ensure_session(&headers, &auth_state) {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to establish session: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };
    let session_hash = hash_session_token(&token);

    let user = match users::find_by_email(&pool, &request.email).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to fetch user: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };

    let Some(user) = user else {
        let payload = flash_payload(
            INVALID_CREDENTIAL_MESSAGE,
            [("email", request.email.as_str())],
        );
        return flash_and_redirect(&pool, &session_hash, &payload, "/login", set_cookie).await;
    };

    if !user.verified {
        // An unverified login attempt doubles as a resend request: issue a
        // fresh code (superseding any pending one) and route to the verify
        // step. Never creates an authenticated session.
        let code = match otp::issue(&pool, &user.email, auth_state.otp_ttl_seconds()).await {
            Ok(code) => code,
            Err(err) => {
                error!("Failed to reissue verification code: {err}");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                    .into_response();
            }
        };

        // Fire-and-forget relative to the redirect; a failure is only logged.
        let message = verification_email(&user.email, &code, auth_state.otp_ttl_seconds());
        let mailer = Arc::clone(&mailer);
        tokio::spawn(async move {
            if let Err(err) = mailer.send(&message).await {
                error!("Failed to resend verification email: {err}");
            }
        });

        let payload = flash_payload(UNVERIFIED_MESSAGE, [("email", request.email.as_str())]);
        return flash_and_redirect(&pool, &session_hash, &payload, "/verify", set_cookie).await;
    }

    if !users::verify_credential(&request.password, &user.password_hash) {
        let payload = flash_payload(
            INVALID_CREDENTIAL_MESSAGE,
            [("email", request.email.as_str())],
        );
        return flash_and_redirect(&pool, &session_hash, &payload, "/login", set_cookie).await;
    }

    // Credentials and verification both check out: rotate to a fresh
    // authenticated session token.
    let session_token = match create_session(&pool, &user).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
                .into_response();
        }
    };

    match session_cookie(&auth_state, &session_token) {
        Ok(cookie) => redirect_to("/", Some(cookie)),
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let auth_state = Arc::new(AuthConfig::new("http://localhost:8080".to_string()));
        let response = login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state),
            Extension(Arc::new(Mailer::Log)),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_form_without_cookie_returns_defaults() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login_form(HeaderMap::new(), Extension(pool))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
