//! Outgoing e-mail. SendGrid when configured, otherwise messages are only logged.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use utils::config::SendGridConfig;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email transport error: {0}")]
    Transport(String),
    #[error("email rejected: http {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Clone)]
enum Transport {
    SendGrid {
        http: Client,
        api_key: SecretString,
        from: String,
    },
    Log,
}

#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
}

fn sendgrid_payload(from: &str, message: &EmailMessage) -> Value {
    json!({
        "personalizations": [{ "to": [{ "email": message.to }] }],
        "from": { "email": from, "name": "GiftGenie" },
        "subject": message.subject,
        "content": [{ "type": "text/plain", "value": message.text }],
    })
}

impl EmailService {
    pub fn new(config: Option<SendGridConfig>) -> Result<Self, EmailError> {
        let Some(config) = config else {
            return Ok(Self::log_only());
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(Self {
            transport: Transport::SendGrid {
                http,
                api_key: config.api_key,
                from: config.from,
            },
        })
    }

    pub fn log_only() -> Self {
        Self {
            transport: Transport::Log,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        match self.transport {
            Transport::SendGrid { .. } => "sendgrid",
            Transport::Log => "log",
        }
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        match &self.transport {
            Transport::Log => {
                info!(
                    to = %message.to,
                    subject = %message.subject,
                    body = %message.text,
                    "E-mail (log transport)"
                );
                Ok(())
            }
            Transport::SendGrid {
                http,
                api_key,
                from,
            } => {
                let res = http
                    .post(SENDGRID_URL)
                    .bearer_auth(api_key.expose_secret())
                    .json(&sendgrid_payload(from, message))
                    .send()
                    .await
                    .map_err(|e| EmailError::Transport(e.to_string()))?;
                if res.status().is_success() {
                    info!(to = %message.to, subject = %message.subject, "E-mail sent");
                    return Ok(());
                }
                let status = res.status().as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(EmailError::Rejected { status, body })
            }
        }
    }
}
