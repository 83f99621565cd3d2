//! Outbound verification email delivery.
//!
//! Delivery is best-effort by design: on the signup path the send is awaited
//! and a failure is logged but not surfaced; the account stays unverified and
//! a later login attempt triggers a resend. On the login-resend path the send
//! is fire-and-forget relative to the HTTP response.
//!
//! The default for local development is [`Mailer::Log`], which logs the
//! message instead of delivering it. Production uses [`HttpMailer`], which
//! posts JSON to a mail relay endpoint.

use crate::APP_USER_AGENT;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Compose the verification email carrying the plaintext code.
#[must_use]
pub fn verification_email(to_email: &str, code: &str, ttl_seconds: i64) -> EmailMessage {
    let minutes = ttl_seconds / 60;
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Verify your email - Vetrina".to_string(),
        body: format!(
            "Welcome to Vetrina! Your verification code is {code}. \
             Enter it in the shop to verify your email. \
             The code is valid for {minutes} minutes."
        ),
    }
}

/// Mail relay client: posts the message as JSON with a bearer token.
#[derive(Clone, Debug)]
pub struct HttpMailer {
    client: Client,
    relay_url: String,
    sender: String,
    token: SecretString,
}

impl HttpMailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(relay_url: String, sender: String, token: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build mail relay client")?;
        Ok(Self {
            client,
            relay_url,
            sender,
            token,
        })
    }

    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = json!({
            "from": self.sender,
            "to": message.to_email,
            "subject": message.subject,
            "text": message.body,
        });

        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(self.token.expose_secret())
            .json(&payload)
            .send()
            .await
            .context("failed to reach mail relay")?;

        if !response.status().is_success() {
            return Err(anyhow!("mail relay rejected message: {}", response.status()));
        }

        Ok(())
    }
}

/// Email delivery backend selected at startup.
#[derive(Clone, Debug)]
pub enum Mailer {
    /// Local dev: log the payload instead of sending real email.
    Log,
    Http(HttpMailer),
}

impl Mailer {
    /// Deliver a message.
    ///
    /// # Errors
    /// Returns an error if the relay is unreachable or rejects the message.
    /// Callers decide whether that failure is fatal; the verification flows
    /// log and swallow it.
    pub async fn send(&self, message: &EmailMessage) -> Result<()> {
        match self {
            Self::Log => {
                info!(
                    to_email = %message.to_email,
                    subject = %message.subject,
                    body = %message.body,
                    "email send stub"
                );
                Ok(())
            }
            Self::Http(mailer) => mailer.send(message).await,
        }
    }
}
