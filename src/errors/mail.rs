//! Outbound email errors
//!
//! Notification delivery is best-effort, so these errors are logged by the
//! caller and never surface in an API response.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    /// Provider is configured but missing a credential
    #[error("Mail provider not configured: {0}")]
    NotConfigured(String),

    /// HTTP transport failed before the provider answered
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl MailError {
    /// Check if retrying the same message could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::NotConfigured(_) => false,
            MailError::Transport(_) => true,
            MailError::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
