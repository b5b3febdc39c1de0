//! OpenAI-compatible chat client
//!
//! Works against OpenAI, OpenRouter, Azure and other compatible endpoints.
//! Responses are plain text; structured extraction asks for JSON and
//! tolerates markdown code fences around it.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use async_trait::async_trait;

use crate::agent::classify::Intent;
use crate::config::Settings;
use crate::error::{DaybookError, Result};
use crate::types::Entities;

use super::LanguageModel;

const EXTRACT_SYSTEM_PROMPT: &str = "You are the extraction engine of a personal wellness \
assistant. Today's date is {today}. Extract every piece of trackable data from the user's \
message into a single JSON object with these optional keys:\n\
- sleep: {date, bedtime_hour, bedtime_minute, wake_hour, wake_minute, duration_hours, \
quality (poor|fair|good|excellent), notes}\n\
- exercise: list of {date, exercise_type (run|walk|gym|weights|yoga|swim|cycle|other), \
body_parts (list of full_body|chest|biceps|triceps|shoulders|back|abs|lower_body|other), \
duration_minutes, distance_km, intensity (1-10), notes}\n\
- wellness: {date, time_of_day, meditation_minutes, meditation_type \
(meditation|cleaning|sitting|group_meditation|other), mood_score (1-10), \
energy_level (1-10), notes}\n\
- tasks: list of {task, priority (1=high, 2=medium, 3=low)}\n\
- reading_links: list of {url, context}\n\
- journal_note: free text worth journaling\n\
Dates are ISO-8601; resolve relative dates against today. Omit everything the message \
does not mention - never invent values. Respond with the JSON object only.";

const CLASSIFY_SYSTEM_PROMPT: &str = "Classify the user's message into one of three intents:\n\
- 'log': the user is sharing anything about their day, health, mood, activities, plans, \
food, work, journal entries, tasks, links, or anything they did, felt, or are planning \
to do. When in doubt, choose 'log'.\n\
- 'query': the user is asking a question about their past tracked data, e.g. 'how did I \
sleep this week?', 'show me my exercise log'.\n\
- 'other': truly unrelated - maths help, news, random facts, technical questions with no \
personal wellness context.\n\
Reply with exactly one word: log, query or other.";

const SMALLTALK_SYSTEM_PROMPT: &str = "You are a friendly personal wellness assistant. The \
user sent a message that doesn't clearly map to logging or querying data. Briefly \
acknowledge what they said (1-2 sentences), then gently ask if they'd like to log any \
part of it - mood, activity, tasks or plans. Be warm and concise. Plain text only.";

const QUERY_SYSTEM_PROMPT: &str = "You are a helpful wellness assistant. Answer the user's \
question based ONLY on the following historical data logs. Be concise and friendly. If \
the data doesn't contain the answer, say so.\n\nData logs:\n{context}";

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build from settings; fails when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .openai_api_key
            .clone()
            .ok_or_else(|| DaybookError::Config("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self::new(
            api_key,
            settings.openai_base_url.clone(),
            settings.openai_model.clone(),
        ))
    }

    /// One chat completion; returns the assistant message text.
    async fn chat(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "temperature": temperature,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DaybookError::Extraction(format!(
                "chat API error {}: {}",
                status, body
            )));
        }

        let data: serde_json::Value = response.json().await?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DaybookError::Extraction("empty chat completion".to_string()))?;
        Ok(content.to_string())
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn extract(
        &self,
        text: &str,
        reference_date: NaiveDate,
        recent_history: &str,
    ) -> Result<Entities> {
        let mut system = EXTRACT_SYSTEM_PROMPT.replace("{today}", &reference_date.to_string());
        if !recent_history.is_empty() {
            system.push_str(
                "\n\nRecent conversation (avoid re-extracting data the user is repeating):\n",
            );
            system.push_str(recent_history);
        }
        let reply = self.chat(&system, text, 0.1).await?;
        debug!(reply_len = reply.len(), "extraction reply received");
        parse_json_reply(&reply)
    }

    async fn classify_intent(&self, text: &str) -> Result<Intent> {
        let reply = self.chat(CLASSIFY_SYSTEM_PROMPT, text, 0.0).await?;
        Ok(parse_intent(&reply))
    }

    async fn smalltalk_reply(&self, text: &str) -> Result<String> {
        self.chat(SMALLTALK_SYSTEM_PROMPT, text, 0.5).await
    }

    async fn answer_query(&self, question: &str, context: &str) -> Result<String> {
        let system = QUERY_SYSTEM_PROMPT.replace("{context}", context);
        self.chat(&system, question, 0.2).await
    }
}

/// Parse a JSON value out of a model reply that may wrap it in a markdown
/// code fence.
fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let payload = extract_code_block(reply).unwrap_or_else(|| reply.trim());
    serde_json::from_str(payload)
        .map_err(|e| DaybookError::Extraction(format!("unparseable model JSON: {}", e)))
}

fn extract_code_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Map a one-word classification reply onto [`Intent`], biased toward log.
fn parse_intent(reply: &str) -> Intent {
    let normalized = reply.trim().to_lowercase();
    if let Ok(intent) = normalized.parse::<Intent>() {
        return intent;
    }
    // Verbose replies still usually contain the label.
    if normalized.contains("query") {
        Intent::Query
    } else if normalized.contains("other") {
        Intent::Other
    } else {
        Intent::Log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bare_json() {
        let entities: Entities =
            parse_json_reply(r#"{"journal_note": "good day"}"#).unwrap();
        assert_eq!(entities.journal_note.as_deref(), Some("good day"));
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "Here you go:\n```json\n{\"tasks\": [{\"task\": \"buy milk\"}]}\n```";
        let entities: Entities = parse_json_reply(reply).unwrap();
        assert_eq!(entities.tasks.len(), 1);
    }

    #[test]
    fn parses_fence_without_language_tag() {
        let reply = "```\n{\"exercise\": []}\n```";
        let entities: Entities = parse_json_reply(reply).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        let result: Result<Entities> = parse_json_reply("no json here");
        assert!(matches!(result, Err(DaybookError::Extraction(_))));
    }

    #[test]
    fn intent_parsing_is_forgiving() {
        assert_eq!(parse_intent("log"), Intent::Log);
        assert_eq!(parse_intent("  Query\n"), Intent::Query);
        assert_eq!(parse_intent("The intent is: other."), Intent::Other);
        assert_eq!(parse_intent("hmm, unsure"), Intent::Log);
    }
}
