//! Language model collaborator
//!
//! The pipeline treats the model as a black box behind the
//! [`LanguageModel`] trait: text plus context in, a structured candidate
//! (or a reply string) out. The extraction call is wrapped in
//! [`with_backoff`]; exhausting the retry budget is fatal for the turn.

mod openai;

pub use openai::OpenAiChat;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use tracing::warn;

use crate::agent::classify::Intent;
use crate::error::Result;
use crate::types::Entities;

/// Attempt ceiling for the extraction call
pub const EXTRACT_MAX_ATTEMPTS: u32 = 3;

/// First retry delay; doubles per attempt
const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Upper bound on a single retry delay
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// The calls the pipeline makes to a language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Extract a structured candidate from one message.
    ///
    /// `reference_date` resolves relative phrases like "yesterday";
    /// `recent_history` keeps the model from re-extracting data the user is
    /// merely repeating.
    async fn extract(
        &self,
        text: &str,
        reference_date: NaiveDate,
        recent_history: &str,
    ) -> Result<Entities>;

    /// Three-way intent classification, biased toward `log`.
    async fn classify_intent(&self, text: &str) -> Result<Intent>;

    /// Light acknowledgment for messages that are neither logs nor queries.
    async fn smalltalk_reply(&self, text: &str) -> Result<String>;

    /// Answer a question from the provided historical-data context only.
    async fn answer_query(&self, question: &str, context: &str) -> Result<String>;
}

/// Run `call` up to `max_attempts` times with bounded exponential backoff.
///
/// Retries are sequential; a retry never runs concurrently with another for
/// the same operation. Non-retryable errors surface immediately.
pub async fn with_backoff<T, F, Fut>(operation: &str, max_attempts: u32, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                let delay = backoff_delay(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "call failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Exponential delay for the given 1-based attempt, with a little jitter so
/// concurrent threads do not retry in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let doubled = BACKOFF_BASE.saturating_mul(1u32 << (attempt - 1).min(8));
    let capped = doubled.min(BACKOFF_CAP);
    capped + Duration::from_millis(rand::thread_rng().gen_range(0..250))
}
