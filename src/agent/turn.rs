//! Turn controller
//!
//! Runs one message through the whole pipeline:
//!
//! ```text
//! SafetyCheck -> Classify -> {Extract | Query | Chitchat}
//!     -> CompletenessBranch -> {Reprompt | Persist} -> ComposeResponse
//! ```
//!
//! A safety abort short-circuits straight to the response. The clarification
//! loop is bounded: once the turn counter reaches the configured ceiling,
//! missing fields no longer block persistence. Every failure mode resolves
//! to a well-formed state update; only a record-store failure propagates as
//! the turn's terminal error.

use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};

use crate::error::{DaybookError, Result};
use crate::llm::{with_backoff, LanguageModel, EXTRACT_MAX_ATTEMPTS};
use crate::storage::RecordStore;
use crate::sync::DocumentSync;
use crate::types::{to_flat_records, Entities};

use super::classify::Intent;
use super::state::ConversationState;
use super::{completeness, compose, guard, merge, query};

/// Reply when the extraction call exhausts its retries, or a query fails
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong on my end. Please try again in a moment.";

/// Canned acknowledgment when the chitchat call fails
const SMALLTALK_FALLBACK: &str = "Got it! Anything you'd like me to log?";

/// Pipeline stage, used for error context in logs.
#[derive(Debug, Clone, Copy)]
enum Stage {
    SafetyCheck,
    Classify,
    Extract,
    Query,
    Chitchat,
    Persist,
}

/// Sequences one conversation turn end-to-end.
///
/// Holds the collaborators behind their trait seams; one controller is
/// shared by all threads, while each thread's [`ConversationState`] is
/// passed in and mutated per turn.
pub struct TurnController {
    llm: Arc<dyn LanguageModel>,
    records: Arc<dyn RecordStore>,
    documents: Arc<dyn DocumentSync>,
    max_clarification_turns: u32,
}

impl TurnController {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        records: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentSync>,
        max_clarification_turns: u32,
    ) -> Self {
        Self {
            llm,
            records,
            documents,
            max_clarification_turns,
        }
    }

    /// Process one message for one thread and return the reply text.
    pub async fn handle_turn(
        &self,
        state: &mut ConversationState,
        user_id: &str,
        raw_input: &str,
    ) -> Result<String> {
        let reference_date = Local::now().date_naive();
        state.aborted = false;

        // SafetyCheck
        let screened = match guard::screen_input(raw_input) {
            Ok(screened) => screened,
            Err(DaybookError::InjectionDetected) => {
                warn!(user_id, stage = ?Stage::SafetyCheck, "prompt injection blocked");
                return Ok(self.abort(state, guard::REFUSAL_MESSAGE));
            }
            Err(other) => return Err(other),
        };
        if screened.is_crisis {
            warn!(user_id, stage = ?Stage::SafetyCheck, "crisis language detected");
            return Ok(self.abort(state, guard::CRISIS_MESSAGE));
        }
        let text = screened.text;

        // Classify; ambiguity and failure both land on the log path.
        let intent = match self.llm.classify_intent(&text).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(user_id, stage = ?Stage::Classify, %err, "classification failed, assuming log");
                Intent::Log
            }
        };
        info!(user_id, %intent, "message classified");

        match intent {
            Intent::Query => {
                let reply =
                    match query::answer(self.llm.as_ref(), self.records.as_ref(), user_id, &text)
                        .await
                    {
                        Ok(reply) => reply,
                        Err(err) => {
                            error!(user_id, stage = ?Stage::Query, %err, "query failed");
                            GENERIC_FAILURE_MESSAGE.to_string()
                        }
                    };
                state.last_response = Some(reply.clone());
                Ok(reply)
            }
            Intent::Other => {
                let reply = match self.llm.smalltalk_reply(&text).await {
                    Ok(reply) if !reply.trim().is_empty() => reply,
                    Ok(_) => SMALLTALK_FALLBACK.to_string(),
                    Err(err) => {
                        warn!(user_id, stage = ?Stage::Chitchat, %err, "chitchat failed");
                        SMALLTALK_FALLBACK.to_string()
                    }
                };
                state.last_response = Some(reply.clone());
                Ok(reply)
            }
            Intent::Log => self.handle_log(state, user_id, &text, reference_date).await,
        }
    }

    /// Extract, merge, and either re-prompt or persist.
    async fn handle_log(
        &self,
        state: &mut ConversationState,
        user_id: &str,
        text: &str,
        reference_date: chrono::NaiveDate,
    ) -> Result<String> {
        // A fresh topic starts from empty accumulation; stale leftovers from
        // an unrelated prior message must not merge in.
        if !state.has_open_clarification() {
            state.entities = Entities::default();
        }
        let recent_history = if state.has_open_clarification() {
            state
                .last_response
                .as_deref()
                .map(|reply| format!("assistant: {}", reply))
                .unwrap_or_default()
        } else {
            String::new()
        };

        let extracted = with_backoff("extract", EXTRACT_MAX_ATTEMPTS, || {
            self.llm.extract(text, reference_date, &recent_history)
        })
        .await;
        let mut candidate = match extracted {
            Ok(candidate) => candidate,
            Err(err) => {
                error!(user_id, stage = ?Stage::Extract, %err, "extraction retries exhausted");
                state.last_response = Some(GENERIC_FAILURE_MESSAGE.to_string());
                return Ok(GENERIC_FAILURE_MESSAGE.to_string());
            }
        };
        candidate.sanitize();
        merge::merge(&mut state.entities, candidate);
        state.clarification_turns += 1;

        // CompletenessBranch
        let completeness = completeness::check(&state.entities, &state.missing_fields);
        if !completeness.is_complete()
            && state.clarification_turns < self.max_clarification_turns
        {
            let prompt = completeness
                .prompt
                .unwrap_or_else(|| "Could you tell me a bit more?".to_string());
            info!(
                user_id,
                missing = ?completeness.missing_fields,
                turn = state.clarification_turns,
                "asking for clarification"
            );
            state.missing_fields = completeness.missing_fields;
            state.last_response = Some(prompt.clone());
            return Ok(prompt);
        }

        // Persist. Nothing extracted at all still leaves a trace: the raw
        // message becomes a journal note instead of being dropped.
        let mut entities = state.entities.clone();
        if entities.is_empty() {
            info!(user_id, stage = ?Stage::Persist, "no entities, storing raw input as journal");
            entities.journal_note = Some(text.to_string());
        }
        let records = to_flat_records(&entities, reference_date);
        let failed_syncs = self.documents.append(&entities, reference_date).await;
        self.records.save(user_id, &records).await?;

        // ComposeResponse
        let mut response = compose::confirmation(&entities);
        if self.documents.is_enabled() {
            if failed_syncs.is_empty() {
                response.push_str("\n✨ Synced your data to Notion!");
            } else {
                response.push_str(&format!(
                    "\n⚠️ Saved locally, but failed to sync: {}",
                    failed_syncs.join(", ")
                ));
            }
        }

        state.reset_topic();
        state.last_response = Some(response.clone());
        Ok(response)
    }

    /// Abort the turn from the safety check: no extraction, no persistence.
    fn abort(&self, state: &mut ConversationState, message: &str) -> String {
        state.aborted = true;
        state.last_response = Some(message.to_string());
        message.to_string()
    }
}
