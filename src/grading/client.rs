//! Sends one grading payload to the provider and validates the answer.
//!
//! No retries and no caching: each call is independent, and identical
//! payloads may legitimately produce different grades.

use std::sync::Arc;

use tracing::debug;

use super::{parse_grading_result, GradingResult, PromptPayload};
use crate::error::{CoachError, SchemaViolation, TransportKind};
use crate::providers::{CompletionRequest, LlmProvider, Message, ProviderError, ResponseFormat};

/// Default completion budget for one grading.
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Default sampling temperature; low, so grades stay comparable.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

const PING_PROMPT: &str = "Reply with the single word: ok";
const PING_MAX_TOKENS: u32 = 16;

/// Grades payloads through an [`LlmProvider`].
#[derive(Clone)]
pub struct GradingClient {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for GradingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingClient")
            .field("model", &self.provider.model_id())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GradingClient {
    /// Create a client with default sampling settings.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Override the completion budget and temperature.
    #[must_use]
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Model the client grades with.
    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Grade one payload.
    ///
    /// # Errors
    ///
    /// - [`CoachError::Transport`] when the provider cannot be reached or
    ///   rejects the call
    /// - [`CoachError::Schema`] when the answer is not a valid grading result
    pub async fn grade(&self, payload: &PromptPayload) -> Result<GradingResult, CoachError> {
        let response_format = if self.provider.supports_structured_output() {
            ResponseFormat::JsonSchema {
                name: payload.schema_name.clone(),
                schema: payload.schema.clone(),
            }
        } else {
            ResponseFormat::Text
        };

        let request = CompletionRequest {
            messages: vec![Message::user(payload.user.clone())],
            system: Some(payload.system.clone()),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            response_format,
        };

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(classify_provider_error)?;

        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "grading response received"
        );

        Ok(parse_grading_result(&response.text)?)
    }

    /// Send one short plain-text completion to confirm the endpoint, key
    /// and model all work. Returns the model that answered.
    ///
    /// # Errors
    ///
    /// Same classification as [`GradingClient::grade`]; an empty answer is
    /// [`SchemaViolation::EmptyResponse`].
    pub async fn ping(&self) -> Result<String, CoachError> {
        let request = CompletionRequest {
            messages: vec![Message::user(PING_PROMPT)],
            system: None,
            max_tokens: Some(PING_MAX_TOKENS),
            temperature: Some(0.0),
            response_format: ResponseFormat::Text,
        };
        let response = self
            .provider
            .complete(request)
            .await
            .map_err(classify_provider_error)?;
        if response.text.trim().is_empty() {
            return Err(SchemaViolation::EmptyResponse.into());
        }
        debug!(model = %response.model, "connectivity check answered");
        if response.model.is_empty() {
            Ok(self.provider.model_id().to_owned())
        } else {
            Ok(response.model)
        }
    }
}

/// Map a provider failure onto the grading error taxonomy.
pub fn classify_provider_error(err: ProviderError) -> CoachError {
    match err {
        ProviderError::Request(e) => {
            let kind = if e.is_timeout() {
                TransportKind::Timeout
            } else if e.is_connect() {
                TransportKind::Connect
            } else {
                TransportKind::Network
            };
            CoachError::Transport {
                kind,
                detail: e.to_string(),
            }
        }
        ProviderError::HttpStatus { status, body } => {
            let kind = match status {
                401 | 403 => TransportKind::Unauthorized,
                429 => TransportKind::RateLimited,
                other => TransportKind::Status(other),
            };
            CoachError::Transport { kind, detail: body }
        }
        ProviderError::Parse(detail) => CoachError::Schema(SchemaViolation::Envelope(detail)),
        ProviderError::Unavailable(detail) => CoachError::Transport {
            kind: TransportKind::Network,
            detail,
        },
    }
}
