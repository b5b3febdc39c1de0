//! Conversation-state checkpointing
//!
//! The state of each thread's clarification loop is serialized to flat JSON
//! and upserted after every turn, then loaded (or defaulted) before the
//! next one. This is the explicit collaborator contract that replaces any
//! implicit in-process conversation memory.

use rusqlite::{params, OptionalExtension};

use crate::agent::state::ConversationState;
use crate::error::Result;

use super::Storage;

impl Storage {
    /// Load the checkpointed state for a thread, if any.
    pub fn load_conversation_state(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        self.with_connection(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT state FROM conversation_state WHERE thread_id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()?;
            match raw {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
    }

    /// Upsert the checkpoint for a thread.
    pub fn save_conversation_state(
        &self,
        thread_id: &str,
        state: &ConversationState,
    ) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO conversation_state (thread_id, state, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(thread_id) DO UPDATE SET
                     state = excluded.state,
                     updated_at = CURRENT_TIMESTAMP",
                params![thread_id, json],
            )?;
            Ok(())
        })
    }
}
