//! Session cookie handling, the whoami endpoint, and logout.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{
    state::AuthConfig,
    storage::{delete_session, insert_session, lookup_session, SessionRecord},
    types::SessionResponse,
    utils::{generate_session_token, hash_session_token},
};
use crate::store::users::User;

const SESSION_COOKIE_NAME: &str = "vetrina_session";

#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session is authenticated", body = SessionResponse),
        (status = 204, description = "No authenticated session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    match lookup_session(&pool, &token_hash).await {
        Ok(Some(SessionRecord {
            user_id,
            email,
            full_name,
        })) => {
            let response = SessionResponse {
                user_id: user_id.to_string(),
                email,
                full_name,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Session cleared, redirect to login")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthConfig>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    redirect_to("/login", clear_session_cookie(&auth_state).ok())
}

/// Promote a credential-checked, verified user into an authenticated session.
///
/// Returns the raw token so the caller can set the rotated cookie.
pub(super) async fn create_session(pool: &PgPool, user: &User) -> anyhow::Result<String> {
    insert_session(pool, user).await
}

/// Resolve the session token for the current request, minting one when the
/// request arrived without a cookie. The returned header, if any, must be set
/// on the response so the flash written under this token can be read back.
pub(super) fn ensure_session(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> anyhow::Result<(String, Option<HeaderValue>)> {
    if let Some(token) = extract_session_token(headers) {
        return Ok((token, None));
    }
    let token = generate_session_token()?;
    let cookie = session_cookie(config, &token)?;
    Ok((token, Some(cookie)))
}

/// 303 redirect, optionally carrying a Set-Cookie header.
pub(super) fn redirect_to(location: &'static str, cookie: Option<HeaderValue>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static(location));
    if let Some(cookie) = cookie {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::SEE_OTHER, headers).into_response()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    // Only mark cookies secure when the storefront is served over HTTPS.
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn config() -> AuthConfig {
        AuthConfig::new("https://shop.vetrina.dev".to_string())
    }

    #[test]
    fn extract_session_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("other=1; vetrina_session=abc123"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("vetrina_session=abc123"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok".to_string()));
    }

    #[test]
    fn extract_session_token_none_when_missing() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn session_cookie_marks_secure_on_https() -> Result<()> {
        let cookie = session_cookie(&config(), "tok")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("vetrina_session=tok"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_zeroes_max_age() -> Result<()> {
        let cookie = clear_session_cookie(&config())?;
        assert!(cookie.to_str()?.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn ensure_session_reuses_existing_cookie() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("vetrina_session=abc123"),
        );
        let (token, cookie) = ensure_session(&headers, &config())?;
        assert_eq!(token, "abc123");
        assert!(cookie.is_none());
        Ok(())
    }

    #[test]
    fn ensure_session_mints_token_when_absent() -> Result<()> {
        let (token, cookie) = ensure_session(&HeaderMap::new(), &config())?;
        assert!(!token.is_empty());
        assert!(cookie.is_some());
        Ok(())
    }

    #[test]
    fn redirect_carries_location() {
        let response = redirect_to("/login", None);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/login"))
        );
    }
}
