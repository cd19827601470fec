//! OpenAI chat-completions client used for gift recommendations.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, error, warn};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Error)]
pub enum OpenAiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
}

impl OpenAiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    pub fn text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl OpenAiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, OpenAiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("giftgenie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OpenAiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Sends a chat completion, retrying transient failures.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<ChatResponse, OpenAiError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.8,
            max_tokens,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = (|| async { self.send_request(&request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &OpenAiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "OpenAI call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                finish_reason = response.choices.first().and_then(|c| c.finish_reason.as_deref()),
                "OpenAI completion"
            );
        }
        Ok(response)
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse, OpenAiError> {
        let res = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ChatResponse>()
                .await
                .map_err(|e| OpenAiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(OpenAiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(OpenAiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(OpenAiError::Http { status, body })
            }
        }
    }

    /// Asks for a JSON object and deserialises it.
    pub async fn ask_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<T, OpenAiError> {
        let response = self
            .complete(
                vec![ChatMessage::system(system), ChatMessage::user(prompt)],
                max_tokens,
                true,
            )
            .await?;
        let text = response
            .text()
            .ok_or_else(|| OpenAiError::Serde("No choices in response".to_string()))?;

        let json_str = extract_json(text);
        if json_str.is_empty() {
            return Err(OpenAiError::Serde("Empty response from OpenAI".to_string()));
        }

        serde_json::from_str(json_str).map_err(|e| {
            error!(
                json_error = %e,
                preview = %json_str.chars().take(300).collect::<String>(),
                "Failed to parse JSON response from OpenAI"
            );
            OpenAiError::Serde(e.to_string())
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> OpenAiError {
    if e.is_timeout() {
        OpenAiError::Timeout
    } else {
        OpenAiError::Transport(e.to_string())
    }
}

/// The outermost `{...}` object in a model reply. Fences and chatter around
/// it are dropped; text without braces is returned trimmed.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    match (text.find('{'), text.rfind('}')) {
        (Some(open), Some(close)) if open < close => &text[open..=close],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_is_untouched() {
        let input = r#" {"recommendations": []} "#;
        assert_eq!(extract_json(input), r#"{"recommendations": []}"#);
    }

    #[test]
    fn fenced_reply_with_chatter() {
        let input = "Here you go:\n```json\n{\"recommendations\": [{\"name\": \"Mug\"}]}\n```\nEnjoy!";
        assert_eq!(
            extract_json(input),
            r#"{"recommendations": [{"name": "Mug"}]}"#
        );
    }

    #[test]
    fn text_without_object_is_trimmed() {
        assert_eq!(extract_json("  no gifts today "), "no gifts today");
    }

    #[test]
    fn retry_only_transient_errors() {
        assert!(OpenAiError::RateLimited.should_retry());
        assert!(OpenAiError::Http { status: 503, body: String::new() }.should_retry());
        assert!(!OpenAiError::Http { status: 400, body: String::new() }.should_retry());
        assert!(!OpenAiError::InvalidApiKey.should_retry());
    }

    #[test]
    fn request_serialises_json_mode() {
        let request = ChatRequest {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.8,
            max_tokens: 10,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
