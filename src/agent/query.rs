//! Historical-data queries
//!
//! Answers questions like "how did I sleep this week?" by pulling the most
//! recent records per category from the store, rendering them as a compact
//! context block, and letting the model answer from that context only.

use serde_json::Value;

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::storage::RecordStore;
use crate::types::{
    FlatRecord, RECORD_EXERCISE, RECORD_JOURNAL, RECORD_SLEEP, RECORD_TASK, RECORD_WELLNESS,
};

/// Reply when the user asks about history but nothing is stored yet
pub const NO_DATA_MESSAGE: &str = "I don't have any data logged for you yet!";

/// Categories included in query context
const QUERY_TYPES: &[&str] = &[
    RECORD_SLEEP,
    RECORD_EXERCISE,
    RECORD_WELLNESS,
    RECORD_TASK,
    RECORD_JOURNAL,
];

/// Rows fetched per category
const QUERY_LIMIT: i64 = 30;

/// Answer a question about the user's logged history.
pub async fn answer(
    llm: &dyn LanguageModel,
    records: &dyn RecordStore,
    user_id: &str,
    question: &str,
) -> Result<String> {
    let mut sections = Vec::new();

    for record_type in QUERY_TYPES {
        let rows = records.recent(user_id, record_type, QUERY_LIMIT).await?;
        if rows.is_empty() {
            continue;
        }
        let mut lines = vec![format!(
            "## {} (last {} entries)",
            record_type.to_uppercase(),
            rows.len()
        )];
        for row in &rows {
            lines.push(format!("- {}", record_line(row)));
        }
        sections.push(lines.join("\n"));
    }

    if sections.is_empty() {
        return Ok(NO_DATA_MESSAGE.to_string());
    }

    llm.answer_query(question, &sections.join("\n\n")).await
}

/// One record as `key: value` pairs, minus the redundant type tag.
fn record_line(record: &FlatRecord) -> String {
    record
        .iter()
        .filter(|(key, _)| key.as_str() != "type")
        .map(|(key, value)| format!("{}: {}", key, display_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
