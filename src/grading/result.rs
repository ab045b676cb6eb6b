//! Validation of model output into a [`GradingResult`].
//!
//! Nothing is coerced: a fractional score, a quoted number or a score of
//! 150 is a [`SchemaViolation`], not a clamped value.

use serde_json::{Map, Value};

use super::{GradingResult, MAX_SCORE};
use crate::error::SchemaViolation;

/// Parse and validate the model's response text.
///
/// Accepts a bare JSON object, or one wrapped in a Markdown code fence or
/// surrounding prose. Unknown extra fields are ignored.
///
/// # Errors
///
/// Returns the first [`SchemaViolation`] found.
pub fn parse_grading_result(text: &str) -> Result<GradingResult, SchemaViolation> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SchemaViolation::EmptyResponse);
    }

    let value = extract_json(trimmed)?;
    let object = value.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let policy_score = score(object, "policy_score")?;
    let tone_score = score(object, "tone_score")?;
    let clarity_score = score(object, "clarity_score")?;
    let feedback = text_field(object, "feedback")?;
    let suggested_reply = text_field(object, "suggested_reply")?;

    GradingResult::new(
        policy_score,
        tone_score,
        clarity_score,
        feedback,
        suggested_reply,
    )
}

fn extract_json(text: &str) -> Result<Value, SchemaViolation> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(direct) => {
            // Models sometimes wrap the object in a ```json fence or a sentence.
            let embedded = match (text.find('{'), text.rfind('}')) {
                (Some(start), Some(end)) if start < end => text.get(start..=end),
                _ => None,
            };
            embedded
                .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
                .ok_or_else(|| SchemaViolation::NotJson(direct.to_string()))
        }
    }
}

fn score(object: &Map<String, Value>, field: &'static str) -> Result<u8, SchemaViolation> {
    let value = object
        .get(field)
        .ok_or(SchemaViolation::MissingField(field))?;
    let Value::Number(number) = value else {
        return Err(wrong_integer(field));
    };

    let raw = match number.as_i64() {
        Some(raw) => raw,
        None if number.is_u64() => {
            return Err(SchemaViolation::OutOfRange {
                field,
                value: i64::MAX,
            })
        }
        None => return Err(wrong_integer(field)),
    };

    if !(0..=i64::from(MAX_SCORE)).contains(&raw) {
        return Err(SchemaViolation::OutOfRange { field, value: raw });
    }
    u8::try_from(raw).map_err(|_| SchemaViolation::OutOfRange { field, value: raw })
}

fn text_field(object: &Map<String, Value>, field: &'static str) -> Result<String, SchemaViolation> {
    match object.get(field) {
        None => Err(SchemaViolation::MissingField(field)),
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(SchemaViolation::EmptyField(field))
        }
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(SchemaViolation::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn wrong_integer(field: &'static str) -> SchemaViolation {
    SchemaViolation::WrongType {
        field,
        expected: "an integer",
    }
}
