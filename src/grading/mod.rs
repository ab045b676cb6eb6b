//! The grading contract: what goes to the model and what must come back.
//!
//! - [`request`] turns (profile, scenario, reply) into a [`PromptPayload`]
//! - [`result`] validates model output into a [`GradingResult`]
//! - [`client`] sends one payload through an [`crate::providers::LlmProvider`]

use serde::Serialize;

use crate::error::SchemaViolation;

pub mod client;
pub mod request;
pub mod result;

pub use client::GradingClient;
pub use request::{build_request, build_request_with_reference, grading_schema};
pub use result::parse_grading_result;

/// Name under which the output schema is declared to the provider.
pub const SCHEMA_NAME: &str = "grading_result";

/// Score fields, in declaration order.
pub const SCORE_FIELDS: [&str; 3] = ["policy_score", "tone_score", "clarity_score"];

/// Every field of the output schema, in declaration order.
pub const RESULT_FIELDS: [&str; 5] = [
    "policy_score",
    "tone_score",
    "clarity_score",
    "feedback",
    "suggested_reply",
];

/// Highest score the grader may award.
pub const MAX_SCORE: u8 = 100;

/// A trainee's draft answer to one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraineeReply {
    /// Scenario the reply answers.
    pub scenario_id: String,
    /// Reply text exactly as typed.
    pub text: String,
}

impl TraineeReply {
    /// Create a reply.
    pub fn new(scenario_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            text: text.into(),
        }
    }
}

/// Everything sent to the model for one grading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPayload {
    /// Grader persona, hotel guidance and output schema.
    pub system: String,
    /// Scenario, optional reference material and the trainee reply.
    pub user: String,
    /// Name of the declared schema.
    pub schema_name: String,
    /// JSON Schema the response must satisfy.
    pub schema: serde_json::Value,
}

impl PromptPayload {
    /// Whether `needle` occurs anywhere in the instruction text.
    pub fn contains(&self, needle: &str) -> bool {
        self.system.contains(needle) || self.user.contains(needle)
    }
}

/// A validated grade. Scores are within `0..=100` and text fields are non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradingResult {
    policy_score: u8,
    tone_score: u8,
    clarity_score: u8,
    feedback: String,
    suggested_reply: String,
}

impl GradingResult {
    /// Build a result, enforcing the same invariants as response parsing.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaViolation`] for a score above 100 or a blank text field.
    pub fn new(
        policy_score: u8,
        tone_score: u8,
        clarity_score: u8,
        feedback: impl Into<String>,
        suggested_reply: impl Into<String>,
    ) -> Result<Self, SchemaViolation> {
        for (field, score) in SCORE_FIELDS
            .into_iter()
            .zip([policy_score, tone_score, clarity_score])
        {
            if score > MAX_SCORE {
                return Err(SchemaViolation::OutOfRange {
                    field,
                    value: i64::from(score),
                });
            }
        }
        let feedback = non_blank("feedback", feedback.into())?;
        let suggested_reply = non_blank("suggested_reply", suggested_reply.into())?;
        Ok(Self {
            policy_score,
            tone_score,
            clarity_score,
            feedback,
            suggested_reply,
        })
    }

    /// Adherence to hotel policy.
    pub fn policy_score(&self) -> u8 {
        self.policy_score
    }

    /// Match with the hotel's tone guidelines.
    pub fn tone_score(&self) -> u8 {
        self.tone_score
    }

    /// Clarity of the reply.
    pub fn clarity_score(&self) -> u8 {
        self.clarity_score
    }

    /// Short, concrete coaching feedback.
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    /// The same decision, reworded in house style.
    pub fn suggested_reply(&self) -> &str {
        &self.suggested_reply
    }
}

fn non_blank(field: &'static str, value: String) -> Result<String, SchemaViolation> {
    if value.trim().is_empty() {
        return Err(SchemaViolation::EmptyField(field));
    }
    Ok(value)
}
