//! Record store
//!
//! Flat records with a `type` discriminator tag are stored as JSON blobs in
//! a simple table, one row per record. The [`RecordStore`] trait is the
//! collaborator contract the turn controller persists through; the SQLite
//! implementation is the default backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::FlatRecord;

use super::Storage;

/// Collaborator contract for persisting and reading back flat records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Save a batch of records for one user. All-or-nothing.
    async fn save(&self, user_id: &str, records: &[FlatRecord]) -> Result<()>;

    /// Most recent records of one type, newest first.
    async fn recent(&self, user_id: &str, record_type: &str, limit: i64)
        -> Result<Vec<FlatRecord>>;

    /// Per-type record counts for one user.
    async fn type_counts(&self, user_id: &str) -> Result<Vec<(String, i64)>>;
}

/// SQLite-backed record store
pub struct SqliteRecordStore {
    storage: Arc<Storage>,
}

impl SqliteRecordStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn save(&self, user_id: &str, records: &[FlatRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.storage.with_transaction(|conn| {
            for record in records {
                let record_type = record
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                let date = record
                    .get("date")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| Utc::now().date_naive().to_string());
                conn.execute(
                    "INSERT INTO records (user_id, date, record_type, data)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, date, record_type, serde_json::to_string(record)?],
                )?;
            }
            Ok(())
        })?;
        info!(user_id, count = records.len(), "records saved");
        Ok(())
    }

    async fn recent(
        &self,
        user_id: &str,
        record_type: &str,
        limit: i64,
    ) -> Result<Vec<FlatRecord>> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM records
                 WHERE user_id = ?1 AND record_type = ?2
                 ORDER BY date DESC, id DESC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![user_id, record_type, limit], |row| {
                row.get::<_, String>(0)
            })?;

            let mut records = Vec::new();
            for raw in rows {
                let raw = raw?;
                match serde_json::from_str::<FlatRecord>(&raw) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!(%err, "skipping unparseable stored record"),
                }
            }
            Ok(records)
        })
    }

    async fn type_counts(&self, user_id: &str) -> Result<Vec<(String, i64)>> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT record_type, COUNT(*) FROM records
                 WHERE user_id = ?1 GROUP BY record_type ORDER BY record_type",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
    }
}
