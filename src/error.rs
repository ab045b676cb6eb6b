//! Error taxonomy shared by the loader, the request builder and the grading client.
//!
//! Every failure reaches the presentation layer as a typed [`CoachError`].
//! The library never retries or swallows one on the caller's behalf.

use std::fmt;

/// Top-level error returned by every fallible library operation.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// Malformed or missing configuration (profile, scenarios, app config,
    /// credential). Fatal to startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-side contract violation, e.g. an empty reply.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The provider could not be reached or refused the call.
    #[error("transport error ({kind}): {detail}")]
    Transport {
        /// Failure class.
        kind: TransportKind,
        /// Sanitised detail suitable for display.
        detail: String,
    },

    /// The provider answered, but not with a valid grading result.
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaViolation),
}

impl CoachError {
    /// Shorthand for [`CoachError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for [`CoachError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether resubmitting the same payload may succeed.
    ///
    /// Transport failures are transient; schema violations may clear on a
    /// second sample from a non-deterministic model.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Schema(_))
    }
}

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request exceeded the configured timeout.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// The provider rejected the credential (401/403).
    Unauthorized,
    /// The provider is rate limiting this key (429).
    RateLimited,
    /// Any other non-success HTTP status.
    Status(u16),
    /// Any other network failure.
    Network,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connect => f.write_str("connect"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Network => f.write_str("network"),
        }
    }
}

/// Ways a provider response can fail the grading result contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    /// The provider envelope itself could not be understood.
    #[error("malformed provider envelope: {0}")]
    Envelope(String),
    /// The model returned no text at all.
    #[error("model returned an empty response")]
    EmptyResponse,
    /// The response text contains no parseable JSON.
    #[error("response is not JSON: {0}")]
    NotJson(String),
    /// The response JSON is not an object.
    #[error("response JSON is not an object")]
    NotAnObject,
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field has the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Human description of the expected type.
        expected: &'static str,
    },
    /// A score lies outside `[0, 100]`.
    #[error("field `{field}` is {value}, outside 0..=100")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Value returned by the model.
        value: i64,
    },
    /// A text field is empty or whitespace only.
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),
}
