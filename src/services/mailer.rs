//! Outbound notification email.
//!
//! Delivery is best-effort: [`notify`] logs failures and never returns them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, EmailProvider};
use crate::errors::MailError;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Fallback used when no provider is configured; only logs
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn provider(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            "Email delivery disabled, dropping \"{}\" to {}",
            message.subject, message.to
        );
        Ok(())
    }
}

#[derive(Debug)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn provider(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if self.api_key.is_empty() {
            return Err(MailError::NotConfigured("RESEND_API_KEY is empty".to_string()));
        }

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&ResendPayload {
                from: &self.from,
                to: [&message.to],
                subject: &message.subject,
                text: &message.text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Sent \"{}\" to {} via resend", message.subject, message.to);
        Ok(())
    }
}

/// Pick the transport named by the configuration
pub fn build_mailer(config: &AppConfig) -> Arc<dyn Mailer> {
    match config.email_provider {
        EmailProvider::Resend => match config.resend_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                Arc::new(ResendMailer::new(key, config.email_from.clone()))
            }
            _ => {
                warn!("EMAIL_PROVIDER=resend but RESEND_API_KEY is not set, emails will only be logged");
                Arc::new(LogMailer)
            }
        },
        EmailProvider::Smtp => {
            warn!("SMTP transport is not available in this build, emails will only be logged");
            Arc::new(LogMailer)
        }
        EmailProvider::None => Arc::new(LogMailer),
    }
}

/// Send without failing the caller
pub async fn notify(mailer: &dyn Mailer, message: MailMessage) {
    if let Err(err) = mailer.send(&message).await {
        warn!(
            "Failed to send \"{}\" to {} via {} (retryable: {}): {}",
            message.subject,
            message.to,
            mailer.provider(),
            err.is_retryable(),
            err
        );
    }
}
