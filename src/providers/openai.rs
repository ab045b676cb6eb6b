//! OpenAI-compatible provider using the `/chat/completions` API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::credentials::ApiKey;
use crate::grading::client::DEFAULT_MAX_TOKENS;

use super::{
    check_http_response, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
    ResponseFormat, Role, StopReason, UsageStats,
};

/// Base URL used when none is configured.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const MODELS_PATH: &str = "/models";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier.
    pub model: String,
    /// System message first, then the prompt.
    pub messages: Vec<OpenAiMessage>,
    /// Completion token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Structured output declaration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

/// One chat message on the wire.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// Chat completions response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    /// Response choices.
    pub choices: Vec<OpenAiChoice>,
    /// Model that served the response. Some gateways omit it.
    #[serde(default)]
    pub model: Option<String>,
    /// Token usage.
    pub usage: Option<OpenAiUsage>,
}

/// A response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    /// The generated message.
    pub message: OpenAiResponseMessage,
    /// `stop`, `length`, `content_filter`, ...
    pub finish_reason: Option<String>,
}

/// Assistant message.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiResponseMessage {
    /// Generated text; absent on refusal.
    pub content: Option<String>,
    /// Refusal text returned instead of structured content.
    #[serde(default)]
    pub refusal: Option<String>,
}

/// `GET /models` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiModelList {
    /// Listed models.
    pub data: Vec<OpenAiModel>,
}

/// One listed model.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiModel {
    /// Model identifier as accepted in `model`.
    pub id: String,
}

/// Usage statistics.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct OpenAiUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: Option<u32>,
    /// Tokens generated.
    pub completion_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    model_name: String,
    api_key: ApiKey,
    endpoint: String,
    models_url: String,
    structured_output: bool,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a provider for `model_name` behind `base_url`.
    ///
    /// `base_url` is the API root (e.g. `https://api.openai.com/v1`); a URL
    /// that already ends in `/chat/completions` is used as is.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Request` if the HTTP client cannot be built.
    pub fn new(
        model_name: String,
        api_key: ApiKey,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            model_name,
            api_key,
            endpoint: chat_completions_url(base_url),
            models_url: models_url(base_url),
            structured_output: true,
            client,
        })
    }

    /// Disable `response_format` for gateways that reject it.
    #[must_use]
    pub fn without_structured_output(mut self) -> Self {
        self.structured_output = false;
        self
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List the model identifiers the endpoint serves.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the call fails or the body is not a model list.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        debug!(url = %self.models_url, "listing models");
        let response = self
            .client
            .get(&self.models_url)
            .bearer_auth(self.api_key.expose())
            .send()
            .await?;
        let payload = check_http_response(response).await?;
        parse_model_list(&payload)
    }
}

/// Resolve the chat completions URL for an API root.
pub fn chat_completions_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_owned()
    } else {
        format!("{trimmed}{CHAT_COMPLETIONS_PATH}")
    }
}

/// Resolve the model listing URL for an API root.
pub fn models_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    let root = trimmed.strip_suffix(CHAT_COMPLETIONS_PATH).unwrap_or(trimmed);
    format!("{root}{MODELS_PATH}")
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Build a wire request from a completion request.
#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest) -> OpenAiRequest {
    let mut messages: Vec<OpenAiMessage> = Vec::with_capacity(request.messages.len().saturating_add(1));

    if let Some(system) = &request.system {
        messages.push(OpenAiMessage {
            role: "system".to_owned(),
            content: system.clone(),
        });
    }

    messages.extend(request.messages.iter().map(|msg| OpenAiMessage {
        role: role_to_openai(msg.role).to_owned(),
        content: msg.content.clone(),
    }));

    let response_format = match &request.response_format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonSchema { name, schema } => Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "strict": true,
                "schema": schema,
            }
        })),
    };

    OpenAiRequest {
        model: model.to_owned(),
        messages,
        max_tokens: Some(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        temperature: request.temperature,
        response_format,
    }
}

/// Parse a wire response into a completion response.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body is not a chat completion or
/// has no choices.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let resp: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("missing choices[0]".to_owned()))?;

    let text = choice.message.content.unwrap_or_default();

    let stop_reason = match choice.finish_reason.as_deref() {
        _ if text.is_empty() && choice.message.refusal.is_some() => StopReason::ContentFilter,
        Some("stop") | None => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        Some(other) => StopReason::Other(other.to_owned()),
    };

    let usage = resp
        .usage
        .map(|u| UsageStats {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        text,
        stop_reason,
        usage,
        model: resp.model.unwrap_or_default(),
    })
}

/// Parse a `GET /models` body into model identifiers, in listed order.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body has no `data` list.
#[doc(hidden)]
pub fn parse_model_list(body: &str) -> Result<Vec<String>, ProviderError> {
    let list: OpenAiModelList =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

fn role_to_openai(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        mut request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if !self.structured_output {
            request.response_format = ResponseFormat::Text;
        }
        let api_request = build_request(&self.model_name, &request);

        debug!(endpoint = %self.endpoint, model = %self.model_name, "sending chat completion");
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .bearer_auth(self.api_key.expose())
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    fn supports_structured_output(&self) -> bool {
        self.structured_output
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }
}
