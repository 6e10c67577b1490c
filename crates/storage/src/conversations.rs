// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation and message persistence.
//!
//! Conversations own jobs (and transitively job events) via cascade
//! deletes. Message content is mirrored into an FTS5 index by the
//! triggers installed in migration 1.

use crate::error::StoreError;
use crate::store::Store;
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// One full-text search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHit {
    pub message_id: i64,
    pub content: String,
}

impl Store {
    /// Create a conversation and return its id.
    pub fn create_conversation(&self, title: &str) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = self.now_ms() as i64;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![id, title, now],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Delete a conversation and, by cascade, its messages, jobs, and
    /// job events.
    pub fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM conversations WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn add_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<i64, StoreError> {
        let now = self.now_ms() as i64;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, role, content, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_message(&self, message_id: i64, content: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET content = ?2 WHERE id = ?1",
                params![message_id, content],
            )?;
            Ok(())
        })
    }

    pub fn delete_message(&self, message_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
            Ok(())
        })
    }

    /// Full-text search over message content.
    pub fn search_messages(&self, query: &str) -> Result<Vec<MessageHit>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT rowid, content FROM messages_fts WHERE messages_fts MATCH ?1
                 ORDER BY rank",
            )?;
            let rows = stmt.query_map([query], |row| {
                Ok(MessageHit { message_id: row.get(0)?, content: row.get(1)? })
            })?;
            let mut hits = Vec::new();
            for row in rows {
                hits.push(row?);
            }
            Ok(hits)
        })
    }
}

#[cfg(test)]
#[path = "conversations_tests.rs"]
mod tests;
