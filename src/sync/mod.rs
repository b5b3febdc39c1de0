//! Document-sync collaborator
//!
//! Mirrors persisted entries into a third-party document service,
//! best-effort: every category fails independently and a failure never
//! aborts the turn. The turn controller names failed categories in the
//! confirmation message.

mod notion;

pub use notion::NotionSync;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::NotionSettings;
use crate::types::Entities;

/// Category names as they appear in failure reports.
pub const CATEGORY_TASKS: &str = "tasks";
pub const CATEGORY_LINKS: &str = "reading_links";
pub const CATEGORY_SLEEP: &str = "sleep";
pub const CATEGORY_EXERCISE: &str = "exercise";
pub const CATEGORY_WELLNESS: &str = "wellness";
pub const CATEGORY_JOURNAL: &str = "journal_note";

/// Collaborator contract for mirroring entries to an external document.
#[async_trait]
pub trait DocumentSync: Send + Sync {
    /// Append whatever the entities hold. Returns the names of categories
    /// that could not be synced; an empty list means full success.
    async fn append(&self, entities: &Entities, reference_date: NaiveDate) -> Vec<String>;

    /// Whether this sink actually forwards anything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// No-op sink used when no document service is configured.
pub struct DisabledSync;

#[async_trait]
impl DocumentSync for DisabledSync {
    async fn append(&self, _entities: &Entities, _reference_date: NaiveDate) -> Vec<String> {
        Vec::new()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Build the document-sync collaborator from settings.
pub fn create_document_sync(settings: &NotionSettings) -> Arc<dyn DocumentSync> {
    if settings.enabled() {
        Arc::new(NotionSync::new(settings.clone()))
    } else {
        Arc::new(DisabledSync)
    }
}
