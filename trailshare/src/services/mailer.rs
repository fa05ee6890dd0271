use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mail API returned status {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Send and log, never fail: notifications must not break the request that triggered them.
pub async fn notify(mailer: &dyn Mailer, email: Email) {
    if let Err(e) = mailer.send(&email).await {
        warn!(error = %e, to = %email.to, subject = %email.subject, "Failed to send email");
    }
}

/// Writes emails to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Email (not sent, mail disabled)");
        Ok(())
    }
}

pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let body = ResendRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.text,
        };
        let response = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Status(status));
        }
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}
