//! Conversation-keyed append-only context store.
//!
//! The only shared mutable resource in the core. Mutation discipline is
//! append-only under per-conversation serialization: concurrent appends to
//! the same conversation are serialized by that conversation's own lock,
//! appends to different conversations never block each other, and reads
//! observe a consistent snapshot (strictly before or strictly after any
//! given append, never a partial entry).
//!
//! Intended as an explicitly owned, injectable object with process-wide
//! lifetime: create one at startup, share it via `Arc`, and hand a fresh
//! store to each test. Persistence beyond process lifetime is a
//! collaborator concern and lives outside this core.

use crate::model::{ClassificationResult, ContextEntry, ConversationContext, ExtractionResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Identifier of one appended entry.
pub type EntryId = String;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    /// No conversation exists under this id. Because `append` always
    /// inserts a complete entry, this store never holds an empty
    /// conversation; "unknown id" and "no history" are therefore unified
    /// in this outcome.
    #[error("Conversation not found: {0}")]
    NotFound(String),
}

/// In-memory context store.
///
/// An entry is constructed fully in memory before being appended, so an
/// append that has started always completes; there is no partial-entry
/// rollback.
#[derive(Debug, Default)]
pub struct ContextStore {
    conversations: RwLock<HashMap<String, Mutex<Vec<ContextEntry>>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh conversation id for callers that did not supply one.
    pub fn generate_conversation_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Appends one (classification, extraction) pair to a conversation,
    /// creating the conversation on first reference.
    pub fn append(
        &self,
        conversation_id: &str,
        classification: ClassificationResult,
        extraction: ExtractionResult,
    ) -> EntryId {
        let entry = ContextEntry {
            entry_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            classification,
            extraction,
        };
        let entry_id = entry.entry_id.clone();

        // Fast path: conversation already exists, take only its own lock.
        {
            let map = self
                .conversations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(entries) = map.get(conversation_id) {
                entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(entry);
                debug!(conversation_id, entry_id = %entry_id, "appended context entry");
                return entry_id;
            }
        }

        // Slow path: create the conversation. Another writer may have
        // raced us here, so re-check under the write lock.
        let mut map = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(conversation_id.to_string())
            .or_default()
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        debug!(conversation_id, entry_id = %entry_id, "appended context entry");
        entry_id
    }

    /// Returns a snapshot of the full conversation history.
    ///
    /// An unknown id is [`ContextError::NotFound`]; see the error docs for
    /// why "no history" never occurs separately here.
    pub fn get(&self, conversation_id: &str) -> Result<ConversationContext, ContextError> {
        let map = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let entries = map
            .get(conversation_id)
            .ok_or_else(|| ContextError::NotFound(conversation_id.to_string()))?;
        let entries = entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(ConversationContext {
            conversation_id: conversation_id.to_string(),
            entries,
        })
    }

    /// Returns the most recent entry of a conversation.
    pub fn get_latest(&self, conversation_id: &str) -> Result<ContextEntry, ContextError> {
        let context = self.get(conversation_id)?;
        context
            .entries
            .last()
            .cloned()
            .ok_or_else(|| ContextError::NotFound(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractorId, Format};
    use std::sync::Arc;

    fn classification(intent: &str) -> ClassificationResult {
        ClassificationResult {
            format: Format::Json,
            format_confidence: 1.0,
            intent: intent.to_string(),
            intent_confidence: 0.5,
            route: ExtractorId::Tabular,
        }
    }

    #[test]
    fn test_append_then_get_latest_roundtrip() {
        let store = ContextStore::new();
        let entry_id = store.append(
            "conv-1",
            classification("invoice"),
            ExtractionResult::empty(ExtractorId::Tabular),
        );

        let latest = store.get_latest("conv-1").unwrap();
        assert_eq!(latest.entry_id, entry_id);
        assert_eq!(latest.classification.intent, "invoice");
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let store = ContextStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(ContextError::NotFound(id)) if id == "nope"
        ));
        assert!(matches!(
            store.get_latest("nope"),
            Err(ContextError::NotFound(_))
        ));
    }

    #[test]
    fn test_entries_preserve_arrival_order() {
        let store = ContextStore::new();
        for intent in ["invoice", "complaint", "rfq"] {
            store.append(
                "conv-1",
                classification(intent),
                ExtractionResult::empty(ExtractorId::Tabular),
            );
        }

        let context = store.get("conv-1").unwrap();
        let intents: Vec<&str> = context
            .entries
            .iter()
            .map(|e| e.classification.intent.as_str())
            .collect();
        assert_eq!(intents, ["invoice", "complaint", "rfq"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_appends_lose_nothing() {
        let store = Arc::new(ContextStore::new());
        let writers = 64usize;

        let mut handles = Vec::new();
        for index in 0..writers {
            let store = Arc::clone(&store);
            // Interleave two conversations so same-id serialization and
            // cross-id independence are both exercised.
            let conversation = if index % 2 == 0 { "conv-a" } else { "conv-b" };
            handles.push(tokio::spawn(async move {
                store.append(
                    conversation,
                    classification(&format!("intent-{index}")),
                    ExtractionResult::empty(ExtractorId::Tabular),
                )
            }));
        }

        let mut entry_ids = Vec::new();
        for handle in handles {
            entry_ids.push(handle.await.unwrap());
        }

        let a = store.get("conv-a").unwrap();
        let b = store.get("conv-b").unwrap();
        assert_eq!(a.entries.len() + b.entries.len(), writers);

        // No duplicated or dropped entries.
        let mut seen: Vec<&str> = a
            .entries
            .iter()
            .chain(b.entries.iter())
            .map(|e| e.entry_id.as_str())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), writers);
        for entry_id in &entry_ids {
            assert!(seen.binary_search(&entry_id.as_str()).is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reads_see_consistent_snapshots() {
        let store = Arc::new(ContextStore::new());
        store.append(
            "conv-a",
            classification("invoice"),
            ExtractionResult::empty(ExtractorId::Tabular),
        );

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..50 {
                    store.append(
                        "conv-a",
                        classification("invoice"),
                        ExtractionResult::empty(ExtractorId::Tabular),
                    );
                }
            })
        };

        // Readers on the same id must always see a whole number of
        // complete entries, monotonically growing.
        let mut last_len = 0usize;
        for _ in 0..50 {
            let snapshot = store.get("conv-a").unwrap();
            assert!(snapshot.entries.len() >= last_len);
            last_len = snapshot.entries.len();
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
        assert_eq!(store.get("conv-a").unwrap().entries.len(), 51);
    }
}
