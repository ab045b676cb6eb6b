//! Grading request construction.
//!
//! Pure functions: the same inputs always yield the same [`PromptPayload`].

use serde_json::{json, Value};

use super::{PromptPayload, TraineeReply, MAX_SCORE, RESULT_FIELDS, SCHEMA_NAME};
use crate::error::CoachError;
use crate::profile::HotelProfile;
use crate::reference::ReferenceSection;
use crate::scenario::Scenario;

const REPLY_OPEN: &str = "<<<REPLY";
const REPLY_CLOSE: &str = "REPLY>>>";

/// JSON Schema of the grading result, as declared to the provider.
pub fn grading_schema() -> Value {
    let score = |description: &str| {
        json!({
            "type": "integer",
            "minimum": 0,
            "maximum": MAX_SCORE,
            "description": description,
        })
    };
    json!({
        "type": "object",
        "properties": {
            "policy_score": score("How well the reply follows the hotel's key policies (0-100)."),
            "tone_score": score("How well the reply matches the hotel's tone guidelines (0-100)."),
            "clarity_score": score("How clear and easy to act on the reply is (0-100)."),
            "feedback": {
                "type": "string",
                "description": "Two or three short, concrete coaching points.",
            },
            "suggested_reply": {
                "type": "string",
                "description": "The same decision as the trainee, reworded in house style.",
            },
        },
        "required": RESULT_FIELDS,
        "additionalProperties": false,
    })
}

/// Build the grading payload for one reply.
///
/// # Errors
///
/// Returns [`CoachError::Validation`] when the reply is blank or answers a
/// different scenario.
pub fn build_request(
    profile: &HotelProfile,
    scenario: &Scenario,
    reply: &TraineeReply,
) -> Result<PromptPayload, CoachError> {
    build_request_with_reference(profile, scenario, reply, &[])
}

/// Build the grading payload, embedding training reference sections.
///
/// Sections are included in the order given.
///
/// # Errors
///
/// Same as [`build_request`].
pub fn build_request_with_reference(
    profile: &HotelProfile,
    scenario: &Scenario,
    reply: &TraineeReply,
    sections: &[ReferenceSection],
) -> Result<PromptPayload, CoachError> {
    if reply.text.trim().is_empty() {
        return Err(CoachError::validation("reply is empty"));
    }
    if reply.scenario_id != scenario.id {
        return Err(CoachError::validation(format!(
            "reply answers scenario `{}`, not `{}`",
            reply.scenario_id, scenario.id
        )));
    }

    let schema = grading_schema();
    Ok(PromptPayload {
        system: system_prompt(profile, &schema),
        user: user_prompt(scenario, reply, sections),
        schema_name: SCHEMA_NAME.to_owned(),
        schema,
    })
}

fn system_prompt(profile: &HotelProfile, schema: &Value) -> String {
    let mut out = format!(
        "You are the front office manager at {name}. A front-desk trainee has drafted a reply \
         to a guest. Grade the draft against the hotel's standards and show how you would say it.\n",
        name = profile.name()
    );

    push_list(&mut out, "TONE GUIDELINES", profile.tone_guidelines());
    push_list(&mut out, "KEY POLICIES", profile.key_policies());
    if !profile.example_phrases().is_empty() {
        push_list(&mut out, "EXAMPLE PHRASES", profile.example_phrases());
    }

    out.push_str(
        "\nSCORING\n\
         - policy_score: does the reply respect every key policy that applies?\n\
         - tone_score: does it follow the tone guidelines?\n\
         - clarity_score: is it clear what happens next for the guest?\n\
         - feedback: short and concrete; name what to keep and what to change.\n\
         - suggested_reply: keep the trainee's decision, reword it in house style. \
         Never invent a policy exception.\n",
    );

    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    out.push_str("\nOUTPUT\nRespond with one JSON object and nothing else. Fields: ");
    out.push_str(&RESULT_FIELDS.join(", "));
    out.push_str(". Scores are integers from 0 to 100. The object must match this JSON Schema:\n");
    out.push_str(&schema_text);
    out.push('\n');
    out
}

fn user_prompt(scenario: &Scenario, reply: &TraineeReply, sections: &[ReferenceSection]) -> String {
    let mut out = String::from("GUEST SITUATION\n");
    out.push_str(&scenario.situation_text);
    out.push('\n');

    if let Some(notes) = scenario
        .expected_policy_notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        out.push_str("\nPOLICY NOTES FOR THE GRADER\n");
        out.push_str(notes);
        out.push('\n');
    }

    if !sections.is_empty() {
        out.push_str("\nTRAINING REFERENCE\n");
        for section in sections {
            out.push_str("### ");
            out.push_str(&section.title);
            out.push('\n');
            out.push_str(&section.content);
            out.push('\n');
        }
    }

    out.push_str("\nTRAINEE REPLY (between the markers, verbatim)\n");
    out.push_str(REPLY_OPEN);
    out.push('\n');
    out.push_str(&reply.text);
    out.push('\n');
    out.push_str(REPLY_CLOSE);
    out.push_str("\n\nGrade the trainee reply now.\n");
    out
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    out.push('\n');
    out.push_str(heading);
    out.push('\n');
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
}
