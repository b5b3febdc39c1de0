//! Completeness checker
//!
//! Given the merged entities and the fields asked about last turn, computes
//! which required fields are still missing and the clarification question to
//! ask, if any. Fields already asked once are not asked again (the user
//! declined to answer; accept the entry without them), with the exception of
//! the exercise type, which identifies the session and is always re-asked
//! while absent.

use crate::types::Entities;

/// Missing-field labels, exactly as they appear in prompts and state.
pub const FIELD_EXERCISE_TYPE: &str = "exercise type";
pub const FIELD_EXERCISE_DURATION: &str = "exercise duration";
pub const FIELD_BODY_PART: &str = "body part";
pub const FIELD_BEDTIME: &str = "bedtime";
pub const FIELD_WAKE_TIME: &str = "wake up time";
pub const FIELD_SLEEP_QUALITY: &str = "sleep quality";

/// Canonical emission order; prompts list fields in this order regardless of
/// discovery order, so they are stable across runs.
const CANONICAL_ORDER: &[&str] = &[
    FIELD_EXERCISE_TYPE,
    FIELD_EXERCISE_DURATION,
    FIELD_BODY_PART,
    FIELD_BEDTIME,
    FIELD_WAKE_TIME,
    FIELD_SLEEP_QUALITY,
];

/// Fixed options prompt for the body-part question.
pub const BODY_PART_PROMPT: &str = "Which body parts did you train? Options: full body, \
chest, biceps, triceps, shoulders, back, abs or lower body.";

/// Outcome of a completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completeness {
    /// Still-missing field labels, in canonical order
    pub missing_fields: Vec<String>,
    /// Clarification question to send, when anything is missing
    pub prompt: Option<String>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

/// Compute the missing-field set and the next clarification prompt.
///
/// `prior_missing` is the list asked in the previous turn; a field present
/// there is suppressed here even if still absent, except the always-re-asked
/// exercise type.
pub fn check(merged: &Entities, prior_missing: &[String]) -> Completeness {
    let mut missing: Vec<&'static str> = Vec::new();
    let already_asked = |label: &str| prior_missing.iter().any(|f| f == label);
    fn add(label: &'static str, missing: &mut Vec<&'static str>) {
        if !missing.contains(&label) {
            missing.push(label);
        }
    }

    for session in &merged.exercise {
        match session.exercise_type {
            // Identity field: re-asked every turn while absent.
            None => add(FIELD_EXERCISE_TYPE, &mut missing),
            Some(kind) => {
                if kind.is_strength()
                    && session.body_parts.as_ref().map_or(true, |p| p.is_empty())
                    && !already_asked(FIELD_BODY_PART)
                {
                    add(FIELD_BODY_PART, &mut missing);
                }
            }
        }
        if session.duration_minutes.is_none() && !already_asked(FIELD_EXERCISE_DURATION) {
            add(FIELD_EXERCISE_DURATION, &mut missing);
        }
    }

    if let Some(sleep) = &merged.sleep {
        if sleep.bedtime_hour.is_none() && !already_asked(FIELD_BEDTIME) {
            add(FIELD_BEDTIME, &mut missing);
        }
        if sleep.wake_hour.is_none() && !already_asked(FIELD_WAKE_TIME) {
            add(FIELD_WAKE_TIME, &mut missing);
        }
        if sleep.quality.is_none() && !already_asked(FIELD_SLEEP_QUALITY) {
            add(FIELD_SLEEP_QUALITY, &mut missing);
        }
    }

    // Canonical ordering keeps prompts deterministic.
    let ordered: Vec<String> = CANONICAL_ORDER
        .iter()
        .filter(|label| missing.contains(*label))
        .map(|label| label.to_string())
        .collect();

    let prompt = compose_prompt(&ordered);
    Completeness { missing_fields: ordered, prompt }
}

/// Render the clarification question for a missing-field set.
fn compose_prompt(missing: &[String]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }

    let wants_body_part = missing.iter().any(|f| f == FIELD_BODY_PART);
    let others: Vec<&str> = missing
        .iter()
        .filter(|f| *f != FIELD_BODY_PART)
        .map(String::as_str)
        .collect();

    if others.is_empty() {
        // Only the body part is missing: the fixed options prompt alone.
        return Some(BODY_PART_PROMPT.to_string());
    }

    let mut prompt = format!("Got it! Could you also specify the {}?", others.join(", "));
    if wants_body_part {
        prompt.push(' ');
        prompt.push_str(BODY_PART_PROMPT);
    }
    Some(prompt)
}
