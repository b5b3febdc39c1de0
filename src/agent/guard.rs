//! Input safety screen
//!
//! Runs before anything else touches a message:
//! - overlong input is truncated with a marker
//! - prompt-injection phrasing fails the screen (the turn aborts with a
//!   generic refusal)
//! - crisis language never fails the screen; it sets a flag so the caller
//!   can reply with resources instead of processing the message
//!
//! Patterns are compiled once and never panic on any input.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{DaybookError, Result};
use crate::types::truncate_chars;

/// Longest input the pipeline will look at, in characters
pub const MAX_INPUT_CHARS: usize = 2000;

/// Appended when input had to be cut
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Reply for screened-out messages
pub const REFUSAL_MESSAGE: &str = "Sorry, I cannot process that message.";

/// Reply when crisis language is detected; sent instead of a normal response
pub const CRISIS_MESSAGE: &str = "I noticed something in your message that concerns me. \
If you are struggling, please reach out:\n\
🆘 iCall (India): 9152987821\n\
🆘 Vandrevala Foundation: 1860-2662-345 (24/7)\n\
I am here to chat whenever you feel ready. 💙";

static INJECTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(ignore previous|disregard instructions|system prompt|jailbreak)")
        .expect("valid regex")
});

static CRISIS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(suicide|self[\s-]?harm|kill myself|end it all)\b").expect("valid regex")
});

/// A message that passed the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenedInput {
    /// Possibly truncated text, safe to forward to the model
    pub text: String,
    /// Crisis language was present; the caller must divert to resources
    pub is_crisis: bool,
}

/// Screen one raw message.
///
/// Returns [`DaybookError::InjectionDetected`] when injection phrasing is
/// present; this is the only way the screen fails.
pub fn screen_input(raw: &str) -> Result<ScreenedInput> {
    let mut text = raw.to_string();
    if text.chars().count() > MAX_INPUT_CHARS {
        warn!(original_chars = text.chars().count(), "truncating overlong message");
        truncate_chars(&mut text, MAX_INPUT_CHARS);
        text.push_str(TRUNCATION_MARKER);
    }

    if INJECTION_PATTERN.is_match(&text) {
        return Err(DaybookError::InjectionDetected);
    }

    let is_crisis = CRISIS_PATTERN.is_match(&text);
    Ok(ScreenedInput { text, is_crisis })
}
