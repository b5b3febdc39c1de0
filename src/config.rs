//! Application configuration
//!
//! One [`Settings`] value is built at process start (from the environment or
//! from CLI flags in the binaries) and threaded explicitly into the turn
//! controller and its collaborators. There are no global singletons.

use std::env;

use crate::error::{DaybookError, Result};

/// Default clarification-turn ceiling before persisting whatever is present
pub const DEFAULT_MAX_CLARIFICATION_TURNS: u32 = 3;

/// All application configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database path (`:memory:` for tests)
    pub db_path: String,
    /// API key for the OpenAI-compatible chat endpoint
    pub openai_api_key: Option<String>,
    /// Chat endpoint base URL
    pub openai_base_url: String,
    /// Chat model name
    pub openai_model: String,
    /// How many clarification round-trips before saving as-is
    pub max_clarification_turns: u32,
    /// Notion document sync (disabled unless configured)
    pub notion: NotionSettings,
}

/// Notion integration settings: one target page per category.
#[derive(Debug, Clone, Default)]
pub struct NotionSettings {
    pub api_key: Option<String>,
    pub tasks_page_id: Option<String>,
    pub links_page_id: Option<String>,
    pub sleep_page_id: Option<String>,
    pub exercise_page_id: Option<String>,
    pub wellness_page_id: Option<String>,
    pub journal_page_id: Option<String>,
}

impl NotionSettings {
    /// Sync is active only when a key is present.
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            max_clarification_turns: DEFAULT_MAX_CLARIFICATION_TURNS,
            notion: NotionSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `DAYBOOK_*` / `OPENAI_API_KEY` / `NOTION_*`
    /// environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();

        let max_turns = match env::var("DAYBOOK_MAX_CLARIFICATION_TURNS") {
            Ok(raw) => raw.parse::<u32>().map_err(|_| {
                DaybookError::Config(format!(
                    "DAYBOOK_MAX_CLARIFICATION_TURNS must be a positive integer, got {:?}",
                    raw
                ))
            })?,
            Err(_) => defaults.max_clarification_turns,
        };
        if max_turns == 0 {
            return Err(DaybookError::Config(
                "DAYBOOK_MAX_CLARIFICATION_TURNS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            db_path: env::var("DAYBOOK_DB_PATH")
                .map(|p| shellexpand::tilde(&p).to_string())
                .unwrap_or(defaults.db_path),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: env::var("DAYBOOK_OPENAI_MODEL").unwrap_or(defaults.openai_model),
            max_clarification_turns: max_turns,
            notion: NotionSettings {
                api_key: env::var("NOTION_API_KEY").ok(),
                tasks_page_id: env::var("NOTION_TASKS_PAGE_ID").ok(),
                links_page_id: env::var("NOTION_LINKS_PAGE_ID").ok(),
                sleep_page_id: env::var("NOTION_SLEEP_PAGE_ID").ok(),
                exercise_page_id: env::var("NOTION_EXERCISE_PAGE_ID").ok(),
                wellness_page_id: env::var("NOTION_WELLNESS_PAGE_ID").ok(),
                journal_page_id: env::var("NOTION_JOURNAL_PAGE_ID").ok(),
            },
        })
    }
}

/// Default database location under the platform data directory.
pub fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("daybook").join("daybook.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "./daybook.db".to_string())
}
