//! Application configuration loading.
//!
//! Settings come from `deskcoach.toml` (or `$DESKCOACH_CONFIG`), then
//! environment overrides. Precedence: env vars > config file > defaults.
//! A missing config file is not an error; every section has defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CoachError;
use crate::grading::client::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::providers::openai::OPENAI_API_BASE;
use crate::reference::DEFAULT_TOP_K;

/// Env var naming an alternative config file.
pub const CONFIG_PATH_VAR: &str = "DESKCOACH_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "deskcoach.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language-model endpoint and sampling settings.
    pub llm: LlmConfig,
    /// Data files.
    pub paths: PathsConfig,
    /// Hotel selection.
    pub hotel: HotelConfig,
    /// Training reference retrieval.
    pub reference: ReferenceConfig,
}

/// Language-model endpoint and sampling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API root of an OpenAI-compatible service.
    pub base_url: String,
    /// Model name as the service knows it.
    pub model: String,
    /// Completion token budget per grading.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Declare the output schema via `response_format`.
    pub structured_output: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_owned(),
            model: "gpt-4o".to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: 60,
            structured_output: true,
        }
    }
}

/// Data file locations, relative to the working directory unless absolute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Hotel profile YAML.
    pub profile: PathBuf,
    /// Scenario catalog YAML; the built-in catalog when unset.
    pub scenarios: Option<PathBuf>,
    /// Training reference YAML; optional on disk.
    pub reference: PathBuf,
    /// `.env` file holding the API key.
    pub dotenv: PathBuf,
    /// Directory for practice session logs; platform data dir when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            profile: PathBuf::from("data/hotel_profile.yaml"),
            scenarios: None,
            reference: PathBuf::from("data/hotel_training_reference.yaml"),
            dotenv: PathBuf::from(".env"),
            logs_dir: None,
        }
    }
}

/// Hotel selection within a multi-hotel profile file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HotelConfig {
    /// Hotel identity under `hotels:`.
    pub id: Option<String>,
}

/// Training reference retrieval settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Embed matching reference sections in grading prompts.
    pub enabled: bool,
    /// Maximum sections embedded per prompt.
    pub top_k: usize,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl AppConfig {
    /// Load configuration: file (if any), then overrides from `env`.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] when the file is unreadable or invalid,
    /// an override does not parse, or the result fails validation.
    pub fn load(env: impl Fn(&str) -> Option<String>) -> Result<Self, CoachError> {
        let path = Self::config_path_with(&env);
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(&env)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, CoachError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .map_err(|e| CoachError::config(format!("{}: {e}", path.display())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(CoachError::config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Resolve the config file path using `env`.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env(CONFIG_PATH_VAR).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] on invalid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoachError> {
        toml::from_str(toml_str)
            .map_err(|e| CoachError::config(format!("failed to parse config TOML: {e}")))
    }

    /// Apply environment overrides.
    ///
    /// Takes a resolver so tests never mutate the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] when a numeric override does not parse.
    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), CoachError> {
        if let Some(v) = env("LLM_API_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("DESKCOACH_TIMEOUT_SECS") {
            self.llm.timeout_secs = v.trim().parse().map_err(|_| {
                CoachError::config(format!("DESKCOACH_TIMEOUT_SECS is not a number: {v:?}"))
            })?;
        }
        if let Some(v) = env("DESKCOACH_PROFILE") {
            self.paths.profile = PathBuf::from(v);
        }
        if let Some(v) = env("DESKCOACH_SCENARIOS") {
            self.paths.scenarios = Some(PathBuf::from(v));
        }
        if let Some(v) = env("DESKCOACH_REFERENCE") {
            self.paths.reference = PathBuf::from(v);
        }
        if let Some(v) = env("DESKCOACH_HOTEL") {
            self.hotel.id = Some(v);
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), CoachError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(CoachError::config("llm.base_url is empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(CoachError::config("llm.model is empty"));
        }
        if self.llm.max_tokens == 0 {
            return Err(CoachError::config("llm.max_tokens must be positive"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(CoachError::config("llm.timeout_secs must be positive"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(CoachError::config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// Directory for practice session logs.
///
/// # Errors
///
/// Returns [`CoachError::Config`] if no platform data directory exists.
pub fn logs_dir(config: &AppConfig) -> Result<PathBuf, CoachError> {
    if let Some(dir) = &config.paths.logs_dir {
        return Ok(dir.clone());
    }
    let dirs = directories::ProjectDirs::from("", "", "deskcoach")
        .ok_or_else(|| CoachError::config("cannot determine a data directory for logs"))?;
    Ok(dirs.data_local_dir().join("logs"))
}
