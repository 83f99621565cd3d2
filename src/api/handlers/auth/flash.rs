//! One-shot flash slot carrying form data and error text across a redirect.
//!
//! Single-writer, single-reader, single-slot per session: a write overwrites
//! any pending entry, and a read removes the entry atomically via
//! `DELETE ... RETURNING`, so a second read before a new write sees nothing.

use anyhow::{Context, Result};
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{error, Instrument};

use super::session::{extract_session_token, redirect_to};
use super::utils::hash_session_token;

pub(super) async fn write_flash(
    pool: &PgPool,
    session_hash: &[u8],
    payload: &HashMap<String, String>,
) -> Result<()> {
    let payload_text = serde_json::to_string(payload).context("failed to serialize flash")?;

    let query = r"
        INSERT INTO session_flash (session_hash, payload)
        VALUES ($1, $2::jsonb)
        ON CONFLICT (session_hash)
        DO UPDATE SET payload = EXCLUDED.payload, created_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_hash)
        .bind(payload_text)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to write flash")?;
    Ok(())
}

pub(super) async fn read_and_clear_flash(
    pool: &PgPool,
    session_hash: &[u8],
) -> Result<Option<HashMap<String, String>>> {
    let query = r"
        DELETE FROM session_flash
        WHERE session_hash = $1
        RETURNING payload::text AS payload
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(session_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to read flash")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let payload_text: String = row.get("payload");
    let payload =
        serde_json::from_str(&payload_text).context("failed to deserialize flash payload")?;
    Ok(Some(payload))
}

/// Build a flash payload from an error message and echoed form fields.
pub(super) fn flash_payload<'a, I>(error_message: &str, fields: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut payload: HashMap<String, String> = fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    payload.insert("error_message".to_string(), error_message.to_string());
    payload
}

/// Empty form state returned when no flash entry is pending.
pub(super) fn empty_form(fields: &[&str]) -> HashMap<String, String> {
    fields
        .iter()
        .map(|field| ((*field).to_string(), String::new()))
        .collect()
}

/// Serve the form-state payload for a GET: the pending flash entry if one
/// exists (consuming it), otherwise blank defaults. Requests without a session
/// cookie skip the store entirely.
pub(super) async fn form_state(headers: &HeaderMap, pool: &PgPool, fields: &[&str]) -> Response {
    let Some(token) = extract_session_token(headers) else {
        return Json(empty_form(fields)).into_response();
    };
    match read_and_clear_flash(pool, &hash_session_token(&token)).await {
        Ok(Some(payload)) => Json(payload).into_response(),
        Ok(None) => Json(empty_form(fields)).into_response(),
        Err(err) => {
            error!("Failed to read flash: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Write the flash entry, then redirect. The flash write happens in the
/// request that decides to redirect; the destination page reads it back.
pub(super) async fn flash_and_redirect(
    pool: &PgPool,
    session_hash: &[u8],
    payload: &HashMap<String, String>,
    location: &'static str,
    cookie: Option<HeaderValue>,
) -> Response {
    if let Err(err) = write_flash(pool, session_hash, payload).await {
        error!("Failed to write flash: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    redirect_to(location, cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_payload_includes_error_and_fields() {
        let payload = flash_payload("oops", [("email", "a@x.com"), ("otp", "123456")]);
        assert_eq!(payload.get("error_message").map(String::as_str), Some("oops"));
        assert_eq!(payload.get("email").map(String::as_str), Some("a@x.com"));
        assert_eq!(payload.get("otp").map(String::as_str), Some("123456"));
    }

    #[test]
    fn empty_form_has_blank_values() {
        let form = empty_form(&["email", "password"]);
        assert_eq!(form.len(), 2);
        assert_eq!(form.get("email").map(String::as_str), Some(""));
    }
}
