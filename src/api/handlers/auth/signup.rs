//! Signup: create an unverified account and issue the first verification code.

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
use super::types::SignupRequest;
use super::utils::{email_is_confirmed, hash_session_token, user_details_are_valid};
use crate::api::email::{verification_email, Mailer};
use crate::store::{
    otp,
    users::{self, CreateOutcome, Profile},
};

const VALIDATION_MESSAGE: &str = "Please check your input. Password must be at least \
     6 characters long, postal code must be 5 characters long.";
const DUPLICATE_MESSAGE: &str = "User exists already! Try logging in instead!";

const SIGNUP_FORM_FIELDS: &[&str] = &[
    "error_message",
    "email",
    "confirm_email",
    "password",
    "full_name",
    "street",
    "postal",
    "city",
];

/// Serve the signup form state: pending flash data or blank defaults.
#[utoipa::path(
    get,
    path = "/signup",
    responses(
        (status = 200, description = "Signup form state", content_type = "application/json")
    ),
    tag = "auth"
)]
pub async fn signup_form(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    form_state(&headers, &pool, SIGNUP_FORM_FIELDS).await
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 303, description = "Redirect: /verify on success, /signup with flash data otherwise"),
        (status = 400, description = "Missing payload", body = String)
    ),
    tag = "auth"
)]
pub async fn signup(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthConfig>>,
    mailer: Extension<Arc<Mailer>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let (token, set_cookie) = match ensure_session(&headers, &auth_state) {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to establish session: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signup failed".to_string())
                .into_response();
        }
    };
    let session_hash = hash_session_token(&token);

    // Echoed inputs let the form re-populate after the redirect. The password
    // is deliberately not echoed; plaintext secrets stay out of the store.
    let echoed = [
        ("email", request.email.as_str()),
        ("confirm_email", request.confirm_email.as_str()),
        ("full_name", request.full_name.as_str()),
        ("street", request.street.as_str()),
        ("postal", request.postal.as_str()),
        ("city", request.city.as_str()),
    ];

    if !user_details_are_valid(
        &request.email,
        &request.password,
        &request.full_name,
        &request.street,
        &request.postal,
        &request.city,
    ) || !email_is_confirmed(&request.email, &request.confirm_email)
    {
        let payload = flash_payload(VALIDATION_MESSAGE, echoed);
        return flash_and_redirect(&pool, &session_hash, &payload, "/signup", set_cookie).await;
    }

    match users::exists(&pool, &request.email).await {
        Ok(true) => {
            let payload = flash_payload(DUPLICATE_MESSAGE, echoed);
            return flash_and_redirect(&pool, &session_hash, &payload, "/signup", set_cookie)
                .await;
        }
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check for existing user: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signup failed".to_string())
                .into_response();
        }
    }

    let profile = Profile {
        full_name: request.full_name.clone(),
        street: request.street.clone(),
        postal: request.postal.clone(),
        city: request.city.clone(),
    };

    // The unique constraint is the real duplicate guard; losing the race with
    // the exists() check above lands here.
    match users::create(&pool, &request.email, &request.password, &profile).await {
        Ok(CreateOutcome::Created(_)) => {}
        Ok(CreateOutcome::Duplicate) => {
            let payload = flash_payload(DUPLICATE_MESSAGE, echoed);
            return flash_and_redirect(&pool, &session_hash, &payload, "/signup", set_cookie)
                .await;
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signup failed".to_string())
                .into_response();
        }
    }

    let code = match otp::issue(&pool, &request.email, auth_state.otp_ttl_seconds()).await {
        Ok(code) => code,
        Err(err) => {
            error!("Failed to issue verification code: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signup failed".to_string())
                .into_response();
        }
    };

    // Awaited so a delivery failure is at least observed before responding.
    // Best-effort beyond that: the account stays unverified and a login
    // attempt triggers a resend.
    let message = verification_email(&request.email, &code, auth_state.otp_ttl_seconds());
    if let Err(err) = mailer.send(&message).await {
        error!("Failed to send verification email: {err}");
    }

    redirect_to("/verify", set_cookie)
}
