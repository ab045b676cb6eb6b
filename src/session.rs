//! Per-run training session context.
//!
//! A [`Session`] holds the immutable hotel profile, the scenario catalog, the
//! training reference and the grading client. It is built once at startup and
//! passed by reference; there is no process-wide state.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;
use crate::credentials::{resolve_api_key, ApiKey, Credentials};
use crate::error::CoachError;
use crate::grading::{
    build_request_with_reference, GradingClient, GradingResult, PromptPayload, TraineeReply,
};
use crate::profile::{load_profile, HotelProfile};
use crate::providers::openai::OpenAiProvider;
use crate::reference::{ReferenceSection, TrainingReference};
use crate::scenario::ScenarioCatalog;

/// Everything one training run needs.
#[derive(Debug)]
pub struct Session {
    profile: Arc<HotelProfile>,
    scenarios: ScenarioCatalog,
    reference: TrainingReference,
    reference_top_k: usize,
    client: GradingClient,
}

impl Session {
    /// Assemble a session from already loaded parts.
    pub fn new(
        profile: HotelProfile,
        scenarios: ScenarioCatalog,
        reference: TrainingReference,
        client: GradingClient,
    ) -> Self {
        Self {
            profile: Arc::new(profile),
            scenarios,
            reference,
            reference_top_k: 0,
            client,
        }
    }

    /// Embed up to `top_k` matching reference sections in each prompt.
    #[must_use]
    pub fn with_reference_top_k(mut self, top_k: usize) -> Self {
        self.reference_top_k = top_k;
        self
    }

    /// Load every part from configuration.
    ///
    /// `env` resolves the API key; see [`Credentials::lookup`].
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] when the credential is missing or any
    /// data file is invalid.
    pub fn from_config(config: &AppConfig, credentials: &Credentials) -> Result<Self, CoachError> {
        let api_key = resolve_api_key(|key| credentials.lookup(key))?;
        let profile = load_profile(&config.paths.profile, config.hotel.id.as_deref())?;
        let scenarios = load_scenarios(config)?;
        let reference = TrainingReference::load(&config.paths.reference)?;

        let provider = build_provider(config, api_key)?;

        info!(
            hotel = %profile.name(),
            scenarios = scenarios.len(),
            reference_sections = reference.sections().len(),
            endpoint = %provider.endpoint(),
            model = %config.llm.model,
            "training session ready"
        );

        let client = GradingClient::new(Arc::new(provider))
            .with_sampling(config.llm.max_tokens, config.llm.temperature);
        let top_k = if config.reference.enabled {
            config.reference.top_k
        } else {
            0
        };
        Ok(Self::new(profile, scenarios, reference, client).with_reference_top_k(top_k))
    }

    /// The hotel profile shared by every grading in this session.
    pub fn profile(&self) -> &Arc<HotelProfile> {
        &self.profile
    }

    /// Available scenarios.
    pub fn scenarios(&self) -> &ScenarioCatalog {
        &self.scenarios
    }

    /// Training reference.
    pub fn reference(&self) -> &TrainingReference {
        &self.reference
    }

    /// Model used for grading.
    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    /// Build the grading payload for a reply.
    ///
    /// Reference sections that match the scenario's situation are embedded;
    /// unscored fallback sections are not.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Validation`] for an unknown scenario or an empty reply.
    pub fn prepare(&self, reply: &TraineeReply) -> Result<PromptPayload, CoachError> {
        let scenario = self.scenarios.require(&reply.scenario_id)?;
        let sections: Vec<ReferenceSection> = if self.reference_top_k == 0 {
            Vec::new()
        } else {
            self.reference
                .retrieve(&scenario.situation_text, self.reference_top_k)
                .into_iter()
                .filter(|hit| hit.score > 0.0)
                .map(|hit| hit.section)
                .collect()
        };
        build_request_with_reference(&self.profile, scenario, reply, &sections)
    }

    /// Grade a prepared payload. Callers may resend the same payload.
    ///
    /// # Errors
    ///
    /// See [`GradingClient::grade`].
    pub async fn grade(&self, payload: &PromptPayload) -> Result<GradingResult, CoachError> {
        self.client.grade(payload).await
    }

    /// Prepare and grade in one step.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any provider call.
    pub async fn submit(&self, reply: &TraineeReply) -> Result<GradingResult, CoachError> {
        let payload = self.prepare(reply)?;
        self.grade(&payload).await
    }
}

/// Build the configured OpenAI-compatible provider.
///
/// # Errors
///
/// Returns [`CoachError::Config`] if the HTTP client cannot be built.
pub fn build_provider(config: &AppConfig, api_key: ApiKey) -> Result<OpenAiProvider, CoachError> {
    let provider = OpenAiProvider::new(
        config.llm.model.clone(),
        api_key,
        &config.llm.base_url,
        Duration::from_secs(config.llm.timeout_secs),
    )
    .map_err(|e| CoachError::config(format!("failed to build HTTP client: {e}")))?;
    Ok(if config.llm.structured_output {
        provider
    } else {
        provider.without_structured_output()
    })
}

/// Load the configured scenario catalog, or the built-in one.
///
/// # Errors
///
/// Returns [`CoachError::Config`] if a configured catalog file is invalid.
pub fn load_scenarios(config: &AppConfig) -> Result<ScenarioCatalog, CoachError> {
    match &config.paths.scenarios {
        Some(path) => ScenarioCatalog::load(path),
        None => Ok(ScenarioCatalog::builtin()),
    }
}
