//! Conversation state
//!
//! One value per active thread, checkpointed between turns. Serializes to
//! flat JSON (plain maps, lists and scalars, ISO dates) so the persistence
//! layer never depends on this crate's types being loadable on the other
//! side.

use serde::{Deserialize, Serialize};

use crate::types::Entities;

/// The per-thread working state of a multi-turn clarification.
///
/// Invariants maintained by the turn controller:
/// - `clarification_turns` strictly increases while `missing_fields` is
///   nonempty, and resets to zero on persist
/// - `entities` is cleared on persist, so confirmed data never bleeds into
///   the next unrelated message
/// - `missing_fields` holds the fields asked about in the previous turn;
///   the completeness check uses it to avoid asking twice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Entities accumulated across the clarification turns of one topic
    #[serde(default)]
    pub entities: Entities,
    /// Field labels asked about in the previous turn
    #[serde(default)]
    pub missing_fields: Vec<String>,
    /// Clarification round-trips spent on the current topic
    #[serde(default)]
    pub clarification_turns: u32,
    /// The last turn was aborted by the safety screen
    #[serde(default)]
    pub aborted: bool,
    /// Last response sent for this thread
    #[serde(default)]
    pub last_response: Option<String>,
}

impl ConversationState {
    /// Whether the previous turn left a clarification open.
    pub fn has_open_clarification(&self) -> bool {
        !self.missing_fields.is_empty()
    }

    /// Close out the current topic after a successful persist.
    pub fn reset_topic(&mut self) {
        self.entities = Entities::default();
        self.missing_fields.clear();
        self.clarification_turns = 0;
    }
}
