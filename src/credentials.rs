//! Credential loading from the process environment and a local `.env` file.
//!
//! The provider API key is read once at startup. Its absence is a
//! configuration error, never a per-request one.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::CoachError;

/// Environment variable holding the provider API key.
pub const API_KEY_VAR: &str = "LLM_API_KEY";

/// Provider API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] when the key is blank.
    pub fn new(key: impl Into<String>) -> Result<Self, CoachError> {
        let key = key.into().trim().to_owned();
        if key.is_empty() {
            return Err(CoachError::config(format!("{API_KEY_VAR} is set but empty")));
        }
        Ok(Self(key))
    }

    /// The raw key, for building the authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

/// Key-value pairs loaded from a `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a value for a key, if present in the file.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look a key up in the process environment first, then the file.
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.get(key).map(str::to_owned))
    }
}

/// Load a `.env` file. A missing file yields empty credentials.
///
/// # Errors
///
/// Returns [`CoachError::Config`] if the file exists but cannot be parsed.
pub fn load_dotenv(path: &Path) -> Result<Credentials, CoachError> {
    if !path.exists() {
        debug!(path = %path.display(), "no .env file");
        return Ok(Credentials::default());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        CoachError::config(format!("failed to read {}: {e}", path.display()))
    })?;

    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            CoachError::config(format!("failed to parse entry in {}: {e}", path.display()))
        })?;
        vars.insert(key, value);
    }

    debug!(path = %path.display(), keys = vars.len(), ".env loaded");
    Ok(Credentials { vars })
}

/// Resolve the provider API key through `env`.
///
/// Takes a resolver so tests never touch the real process environment.
///
/// # Errors
///
/// Returns [`CoachError::Config`] when the key is missing or blank.
pub fn resolve_api_key(env: impl Fn(&str) -> Option<String>) -> Result<ApiKey, CoachError> {
    let raw = env(API_KEY_VAR).ok_or_else(|| {
        CoachError::config(format!(
            "missing {API_KEY_VAR}; export it or add it to .env"
        ))
    })?;
    ApiKey::new(raw)
}
