//! Language-model provider seam used by the grading client.
//!
//! Defines the [`LlmProvider`] trait and the request/response types shared by
//! provider implementations. One provider is implemented:
//! [`openai::OpenAiProvider`] for OpenAI-compatible `/chat/completions`
//! endpoints (OpenAI itself and institutional gateways in front of it).

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod openai;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message.
    System,
    /// Trainee-side input.
    User,
    /// Model output.
    Assistant,
}

/// A text message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Output format requested from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    /// Free text.
    Text,
    /// A single JSON object conforming to `schema`.
    JsonSchema {
        /// Schema name sent to the provider.
        name: String,
        /// JSON Schema object.
        schema: serde_json::Value,
    },
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// A request to an LLM provider for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Messages after the system prompt, oldest first.
    pub messages: Vec<Message>,
    /// Instructions sent ahead of `messages`.
    pub system: Option<String>,
    /// Completion token budget.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Requested output format.
    pub response_format: ResponseFormat,
}

/// The reason a completion stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model finished its answer.
    EndTurn,
    /// Cut off by the token budget.
    MaxTokens,
    /// Output was withheld by a content filter.
    ContentFilter,
    /// Any reason the provider reports that is not mapped above.
    Other(String),
}

/// Usage statistics for a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageStats {
    /// Prompt tokens billed.
    pub input_tokens: u32,
    /// Completion tokens billed.
    pub output_tokens: u32,
}

/// The response from an LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Response text. Empty when the model produced none.
    pub text: String,
    /// Reason generation ended.
    pub stop_reason: StopReason,
    /// Token usage.
    pub usage: UsageStats,
    /// Model the provider says answered; may be empty.
    pub model: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by model providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network or client failure before a status was received.
    #[error("request to provider failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match the provider's wire format.
    #[error("unreadable provider response: {0}")]
    Parse(String),
    /// Non-2xx status from the provider.
    #[error("provider answered {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitised response body.
        body: String,
    },
    /// The provider refused to attempt the call.
    #[error("provider not available: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `ProviderError::Request` on transport failure, `ProviderError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-[A-Za-z0-9_\-]{20,}",
        r"Bearer\s+[A-Za-z0-9._\-]{16,}",
        r"ghp_[A-Za-z0-9]{20,}",
        r"xoxb-[A-Za-z0-9\-]{20,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Core LLM provider interface.
///
/// Implementations must be `Send + Sync` so a provider can be shared by
/// the session and awaited from any task.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one completion request.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the call fails or the envelope is unreadable.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Whether the provider honours [`ResponseFormat::JsonSchema`].
    fn supports_structured_output(&self) -> bool;

    /// Model name requests are sent for.
    fn model_id(&self) -> &str;
}
