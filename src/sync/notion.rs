//! Notion block-append client
//!
//! Each category has its own target page; a category with data but no
//! configured page is skipped silently. API errors are logged and reported
//! as failed category names, never propagated.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::agent::compose;
use crate::config::NotionSettings;
use crate::error::{DaybookError, Result};
use crate::types::{Entities, ReadingLink, TaskItem};

use super::{
    DocumentSync, CATEGORY_EXERCISE, CATEGORY_JOURNAL, CATEGORY_LINKS, CATEGORY_SLEEP,
    CATEGORY_TASKS, CATEGORY_WELLNESS,
};

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion-backed document sync
pub struct NotionSync {
    client: reqwest::Client,
    settings: NotionSettings,
}

impl NotionSync {
    pub fn new(settings: NotionSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn append_blocks(&self, page_id: &str, children: Vec<Value>) -> Result<()> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| DaybookError::Config("NOTION_API_KEY is not set".to_string()))?;
        let url = format!("{}/blocks/{}/children", NOTION_API_BASE, page_id);
        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({ "children": children }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DaybookError::Sync(format!(
                "Notion API error {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    /// Append one category; on failure, push its name onto `failed`.
    async fn sync_category(
        &self,
        category: &str,
        page_id: &Option<String>,
        children: Vec<Value>,
        failed: &mut Vec<String>,
    ) {
        let Some(page_id) = page_id else { return };
        if children.is_empty() {
            return;
        }
        match self.append_blocks(page_id, children).await {
            Ok(()) => info!(category, "synced to Notion"),
            Err(err) => {
                error!(category, %err, "Notion sync failed");
                failed.push(category.to_string());
            }
        }
    }
}

#[async_trait]
impl DocumentSync for NotionSync {
    async fn append(&self, entities: &Entities, reference_date: NaiveDate) -> Vec<String> {
        let mut failed = Vec::new();

        let task_blocks: Vec<Value> = entities.tasks.iter().map(todo_block).collect();
        self.sync_category(
            CATEGORY_TASKS,
            &self.settings.tasks_page_id,
            task_blocks,
            &mut failed,
        )
        .await;

        let link_blocks: Vec<Value> = entities.reading_links.iter().map(link_block).collect();
        self.sync_category(
            CATEGORY_LINKS,
            &self.settings.links_page_id,
            link_blocks,
            &mut failed,
        )
        .await;

        let sleep_blocks: Vec<Value> = entities
            .sleep
            .iter()
            .map(|s| bullet_block(&format!("🛏️ {}", compose::sleep_summary(s))))
            .collect();
        self.sync_category(
            CATEGORY_SLEEP,
            &self.settings.sleep_page_id,
            sleep_blocks,
            &mut failed,
        )
        .await;

        let exercise_blocks: Vec<Value> = entities
            .exercise
            .iter()
            .map(|s| bullet_block(&format!("🏃 {}", compose::exercise_summary(s))))
            .collect();
        self.sync_category(
            CATEGORY_EXERCISE,
            &self.settings.exercise_page_id,
            exercise_blocks,
            &mut failed,
        )
        .await;

        let wellness_blocks: Vec<Value> = entities
            .wellness
            .iter()
            .map(|w| bullet_block(&format!("🧘 {}", compose::wellness_summary(w))))
            .collect();
        self.sync_category(
            CATEGORY_WELLNESS,
            &self.settings.wellness_page_id,
            wellness_blocks,
            &mut failed,
        )
        .await;

        let journal_blocks: Vec<Value> = entities
            .journal_note
            .iter()
            .map(|note| paragraph_block(&format!("📝 {}: {}", reference_date, note)))
            .collect();
        self.sync_category(
            CATEGORY_JOURNAL,
            &self.settings.journal_page_id,
            journal_blocks,
            &mut failed,
        )
        .await;

        failed
    }
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn todo_block(task: &TaskItem) -> Value {
    json!({
        "object": "block",
        "type": "to_do",
        "to_do": {
            "rich_text": rich_text(&compose::task_summary(task)),
            "checked": false,
        }
    })
}

fn link_block(link: &ReadingLink) -> Value {
    let url = link.url_str();
    let content = match &link.context {
        Some(context) => format!("🔖 {} - {}", context, url),
        None => format!("🔖 {}", url),
    };
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": {
            "rich_text": [{
                "type": "text",
                "text": { "content": content, "link": { "url": url } },
            }]
        }
    })
}

fn bullet_block(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "bulleted_list_item",
        "bulleted_list_item": { "rich_text": rich_text(content) }
    })
}

fn paragraph_block(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": { "rich_text": rich_text(content) }
    })
}
