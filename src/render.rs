//! Plain-text rendering for the terminal front end.
//!
//! Pure functions returning `String`s, so layout is testable without a TTY.

use crate::error::{CoachError, SchemaViolation, TransportKind};
use crate::grading::{GradingResult, MAX_SCORE};
use crate::reference::ScoredSection;
use crate::scenario::Scenario;

const BAR_WIDTH: u8 = 20;
const POINTS_PER_CHAR: u8 = MAX_SCORE / BAR_WIDTH;

/// Scenario as shown to the trainee. Policy notes stay hidden.
pub fn render_scenario(scenario: &Scenario) -> String {
    format!(
        "Scenario [{id}]\n  {situation}\n",
        id = scenario.id,
        situation = scenario.situation_text
    )
}

/// One line per scenario for listings.
pub fn render_scenario_line(scenario: &Scenario) -> String {
    format!("{:<18} {}", scenario.id, scenario.situation_text)
}

/// Full grading result.
pub fn render_result(result: &GradingResult) -> String {
    let mut out = String::new();
    out.push_str(&score_line("Policy", result.policy_score()));
    out.push_str(&score_line("Tone", result.tone_score()));
    out.push_str(&score_line("Clarity", result.clarity_score()));
    out.push_str("\nFeedback\n");
    out.push_str(&indent(result.feedback()));
    out.push_str("\nSuggested reply\n");
    out.push_str(&indent(result.suggested_reply()));
    out
}

/// Explain an error to the trainee, with a hint on what to do next.
pub fn render_error(error: &CoachError) -> String {
    match error {
        CoachError::Validation(msg) => format!("Cannot submit: {msg}.\n"),
        CoachError::Config(msg) => format!("Configuration problem: {msg}\n"),
        CoachError::Transport { kind, detail } => {
            let what = match kind {
                TransportKind::Timeout => "the grading service did not answer in time".to_owned(),
                TransportKind::Connect => "the grading service could not be reached".to_owned(),
                TransportKind::Unauthorized => {
                    "the grading service rejected the API key".to_owned()
                }
                TransportKind::RateLimited => "the grading service is rate limiting".to_owned(),
                TransportKind::Status(code) => format!("the grading service returned {code}"),
                TransportKind::Network => "a network error occurred".to_owned(),
            };
            format!("Grading failed: {what}.\n  {detail}\nYou can retry the same reply.\n")
        }
        CoachError::Schema(violation) => {
            let hint = match violation {
                SchemaViolation::Envelope(_) => "the service answered in an unexpected format",
                _ => "the grader's answer was incomplete or invalid",
            };
            format!(
                "Grading failed: {hint} ({violation}).\nNo partial result is shown. \
                 Retrying may produce a valid grade.\n"
            )
        }
    }
}

/// Reference search hits.
pub fn render_sections(hits: &[ScoredSection]) -> String {
    if hits.is_empty() {
        return "No reference sections.\n".to_owned();
    }
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "[{score:>4.1}] {title}\n",
            score = hit.score,
            title = hit.section.title
        ));
        out.push_str(&indent(&hit.section.content));
    }
    out
}

fn score_line(label: &str, score: u8) -> String {
    let filled = score
        .min(MAX_SCORE)
        .checked_div(POINTS_PER_CHAR)
        .unwrap_or(BAR_WIDTH);
    let empty = BAR_WIDTH.saturating_sub(filled);
    format!(
        "{label:<8} {score:>3}/{MAX_SCORE} {}{}\n",
        "#".repeat(usize::from(filled)),
        ".".repeat(usize::from(empty)),
    )
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {line}\n")).collect()
}
