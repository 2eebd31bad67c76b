//! Transactional email

use crate::config::EmailConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A plain-text message to one or more recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Trait for email senders
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Sender name for logs
    fn name(&self) -> &str;
}

/// Client for the hosted email API
pub struct HttpMailer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_base: String, api_key: String, from: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create email HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let request = SendRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::upstream("email", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "email",
                format!("API error {}: {}", status, body),
            ));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Writes messages to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            to = ?message.to,
            subject = %message.subject,
            "Email (log only)"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Keeps sent messages in memory; can be switched to fail every send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.set_failing(true);
        mailer
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::upstream("email", "Simulated delivery failure"));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Create a mailer based on configuration
pub fn create_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    match config.provider.as_str() {
        "http" => {
            let api_base = config.api_base.clone().ok_or_else(|| AppError::Configuration {
                message: "email.api_base is required for the http provider".to_string(),
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "email.api_key is required for the http provider".to_string(),
            })?;
            Ok(Arc::new(HttpMailer::new(
                api_base,
                api_key,
                config.from_address.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "log" => Ok(Arc::new(LogMailer)),
        other => Err(AppError::Configuration {
            message: format!("Unknown email provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["author@journal.org".to_string()],
            subject: "Status update".to_string(),
            text: "Your manuscript is under review.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recording_mailer() {
        let mailer = RecordingMailer::new();
        mailer.send(&message()).await.unwrap();

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Status update");
    }

    #[tokio::test]
    async fn test_failing_mailer_records_nothing() {
        let mailer = RecordingMailer::failing();
        let err = mailer.send(&message()).await.unwrap_err();

        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(mailer.sent().await.is_empty());
    }

    #[test]
    fn test_default_provider_is_log() {
        let mailer = create_mailer(&EmailConfig::default()).unwrap();
        assert_eq!(mailer.name(), "log");
    }

    #[test]
    fn test_http_provider_requires_key() {
        let config = EmailConfig {
            provider: "http".to_string(),
            api_base: Some("https://mail.example".to_string()),
            ..EmailConfig::default()
        };
        assert!(create_mailer(&config).is_err());
    }
}
