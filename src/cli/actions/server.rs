use crate::api::{
    self,
    email::{HttpMailer, Mailer},
    handlers::auth::AuthConfig,
};
use anyhow::{anyhow, Result};
use secrecy::SecretString;
use tracing::warn;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub otp_ttl_seconds: i64,
    pub mail_relay_url: Option<String>,
    pub mail_sender: Option<String>,
    pub mail_token: Option<SecretString>,
    pub mail_log: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if mailer configuration is absent or incomplete, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config =
        AuthConfig::new(args.base_url).with_otp_ttl_seconds(args.otp_ttl_seconds);

    let mailer = resolve_mailer(
        args.mail_relay_url,
        args.mail_sender,
        args.mail_token,
        args.mail_log,
    )?;

    api::new(args.port, args.dsn, auth_config, mailer).await
}

// Mail configuration is resolved once at startup; a missing or half-configured
// relay is a hard error rather than a silent fallback. The log-only mailer is
// an explicit opt-in for development.
fn resolve_mailer(
    relay_url: Option<String>,
    sender: Option<String>,
    token: Option<SecretString>,
    log_only: bool,
) -> Result<Mailer> {
    if let Some(relay_url) = relay_url {
        let sender = sender.ok_or_else(|| anyhow!("Mail sender address is required"))?;
        let token = token.ok_or_else(|| anyhow!("Mail relay token is required"))?;
        return Ok(Mailer::Http(HttpMailer::new(relay_url, sender, token)?));
    }

    if log_only {
        warn!("Mail delivery disabled; verification codes will only be logged");
        return Ok(Mailer::Log);
    }

    Err(anyhow!(
        "Mail relay is not configured; set --mail-relay-url or pass --mail-log for development"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_mailer_requires_configuration() {
        assert!(resolve_mailer(None, None, None, false).is_err());
    }

    #[test]
    fn resolve_mailer_log_is_explicit_opt_in() -> Result<()> {
        assert!(matches!(
            resolve_mailer(None, None, None, true)?,
            Mailer::Log
        ));
        Ok(())
    }

    #[test]
    fn resolve_mailer_rejects_half_configured_relay() {
        let relay = Some("https://mail.vetrina.dev/v1/send".to_string());
        assert!(resolve_mailer(relay.clone(), None, None, false).is_err());
        assert!(resolve_mailer(
            relay,
            Some("no-reply@vetrina.dev".to_string()),
            None,
            false
        )
        .is_err());
    }

    #[test]
    fn resolve_mailer_builds_http_relay() -> Result<()> {
        let mailer = resolve_mailer(
            Some("https://mail.vetrina.dev/v1/send".to_string()),
            Some("no-reply@vetrina.dev".to_string()),
            Some(SecretString::from("token".to_string())),
            false,
        )?;
        assert!(matches!(mailer, Mailer::Http(_)));
        Ok(())
    }
}
