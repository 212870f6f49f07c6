//! Persistence gateway contract and the bundled implementations.
//!
//! Storage is a collaborator, not part of the engine: the orchestrator
//! treats every gateway call as best-effort and keeps working from memory
//! when persistence is absent or failing. A snapshot is the full
//! [`Discussion`] aggregate, so `load_discussion` alone reconstructs a
//! session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::discussion::{Discussion, Message};

/// Errors from gateway implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One row in a discussion listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionSummary {
    pub id: String,
    pub topic: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Discussion> for DiscussionSummary {
    fn from(discussion: &Discussion) -> Self {
        Self {
            id: discussion.id.clone(),
            topic: discussion.topic.clone(),
            message_count: discussion.messages.len(),
            updated_at: discussion.updated_at,
        }
    }
}

/// Durable storage contract consumed by the orchestrator.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Idempotent upsert of a full discussion snapshot, keyed by id.
    /// Called after every single-turn mutation.
    async fn save_discussion(&self, discussion: &Discussion) -> Result<(), StorageError>;

    /// Append one message row to an existing discussion.
    async fn save_message(
        &self,
        discussion_id: &str,
        message: &Message,
    ) -> Result<(), StorageError>;

    /// Load a snapshot sufficient to fully reconstruct the discussion.
    async fn load_discussion(&self, discussion_id: &str)
        -> Result<Option<Discussion>, StorageError>;

    /// Most recently updated discussions, newest first.
    async fn list_discussions(&self, limit: usize) -> Result<Vec<DiscussionSummary>, StorageError>;

    /// Remove a discussion. Returns whether anything was deleted.
    async fn delete_discussion(&self, discussion_id: &str) -> Result<bool, StorageError>;
}

/// Append `message` to `discussion` only when it is the next expected turn;
/// replays after a snapshot save are ignored.
fn append_if_next(discussion: &mut Discussion, message: &Message) {
    if message.turn_number as usize == discussion.messages.len() + 1 {
        discussion.messages.push(message.clone());
        discussion.updated_at = Utc::now();
    }
}

/// In-memory gateway: the reference implementation of the contract, also
/// used as a test double.
#[derive(Default)]
pub struct MemoryGateway {
    discussions: Mutex<HashMap<String, Discussion>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn save_discussion(&self, discussion: &Discussion) -> Result<(), StorageError> {
        let mut discussions = self.discussions.lock().await;
        discussions.insert(discussion.id.clone(), discussion.clone());
        Ok(())
    }

    async fn save_message(
        &self,
        discussion_id: &str,
        message: &Message,
    ) -> Result<(), StorageError> {
        let mut discussions = self.discussions.lock().await;
        if let Some(discussion) = discussions.get_mut(discussion_id) {
            append_if_next(discussion, message);
        }
        Ok(())
    }

    async fn load_discussion(
        &self,
        discussion_id: &str,
    ) -> Result<Option<Discussion>, StorageError> {
        let discussions = self.discussions.lock().await;
        Ok(discussions.get(discussion_id).cloned())
    }

    async fn list_discussions(&self, limit: usize) -> Result<Vec<DiscussionSummary>, StorageError> {
        let discussions = self.discussions.lock().await;
        let mut summaries: Vec<DiscussionSummary> =
            discussions.values().map(DiscussionSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete_discussion(&self, discussion_id: &str) -> Result<bool, StorageError> {
        let mut discussions = self.discussions.lock().await;
        Ok(discussions.remove(discussion_id).is_some())
    }
}

/// File-backed gateway: one pretty-printed JSON snapshot per discussion
/// under a directory. Enough durability for the CLI to resume sessions
/// across restarts.
pub struct JsonFileGateway {
    dir: PathBuf,
}

impl JsonFileGateway {
    /// Open (creating if needed) a snapshot directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self, discussion_id: &str) -> PathBuf {
        self.dir.join(format!("{discussion_id}.json"))
    }

    async fn read_snapshot(&self, path: &Path) -> Result<Option<Discussion>, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_snapshot(&self, discussion: &Discussion) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(discussion)?;
        tokio::fs::write(self.snapshot_path(&discussion.id), json).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileGateway {
    async fn save_discussion(&self, discussion: &Discussion) -> Result<(), StorageError> {
        self.write_snapshot(discussion).await
    }

    async fn save_message(
        &self,
        discussion_id: &str,
        message: &Message,
    ) -> Result<(), StorageError> {
        let path = self.snapshot_path(discussion_id);
        if let Some(mut discussion) = self.read_snapshot(&path).await? {
            append_if_next(&mut discussion, message);
            self.write_snapshot(&discussion).await?;
        }
        Ok(())
    }

    async fn load_discussion(
        &self,
        discussion_id: &str,
    ) -> Result<Option<Discussion>, StorageError> {
        self.read_snapshot(&self.snapshot_path(discussion_id)).await
    }

    async fn list_discussions(&self, limit: usize) -> Result<Vec<DiscussionSummary>, StorageError> {
        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_snapshot(&path).await {
                Ok(Some(discussion)) => summaries.push(DiscussionSummary::from(&discussion)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable snapshot");
                }
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete_discussion(&self, discussion_id: &str) -> Result<bool, StorageError> {
        let path = self.snapshot_path(discussion_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discussion::{DiscussionPhase, PhaseLimits};
    use crate::persona::PersonaRegistry;

    fn make_discussion(id: &str) -> Discussion {
        Discussion::new(
            id,
            "Should we hire more developers?",
            PersonaRegistry::with_defaults().all(),
            PhaseLimits::default(),
        )
    }

    fn make_message(turn: u32) -> Message {
        Message {
            persona_name: "Alexandra Stone".to_string(),
            role: "CEO".to_string(),
            content: format!("turn {turn}"),
            phase: DiscussionPhase::Opening,
            turn_number: turn,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_gateway_roundtrip() {
        let gateway = MemoryGateway::new();
        let mut discussion = make_discussion("d-1");
        discussion.record_turn(make_message(1));

        gateway.save_discussion(&discussion).await.unwrap();
        let loaded = gateway.load_discussion("d-1").await.unwrap().unwrap();

        assert_eq!(loaded.topic, discussion.topic);
        assert_eq!(loaded.turn_order, discussion.turn_order);
        assert_eq!(loaded.current_phase, discussion.current_phase);
        assert_eq!(loaded.phase_turn_count, discussion.phase_turn_count);
        assert_eq!(loaded.messages, discussion.messages);
    }

    #[tokio::test]
    async fn test_memory_gateway_save_is_upsert() {
        let gateway = MemoryGateway::new();
        let mut discussion = make_discussion("d-1");
        gateway.save_discussion(&discussion).await.unwrap();

        discussion.record_turn(make_message(1));
        gateway.save_discussion(&discussion).await.unwrap();

        let loaded = gateway.load_discussion("d-1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_gateway_message_append_and_replay() {
        let gateway = MemoryGateway::new();
        let discussion = make_discussion("d-1");
        gateway.save_discussion(&discussion).await.unwrap();

        let message = make_message(1);
        gateway.save_message("d-1", &message).await.unwrap();
        // Replaying the same row is harmless.
        gateway.save_message("d-1", &message).await.unwrap();

        let loaded = gateway.load_discussion("d-1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_gateway_delete() {
        let gateway = MemoryGateway::new();
        gateway
            .save_discussion(&make_discussion("d-1"))
            .await
            .unwrap();

        assert!(gateway.delete_discussion("d-1").await.unwrap());
        assert!(!gateway.delete_discussion("d-1").await.unwrap());
        assert!(gateway.load_discussion("d-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_gateway_list_ordering_and_limit() {
        let gateway = MemoryGateway::new();
        for id in ["d-1", "d-2", "d-3"] {
            gateway.save_discussion(&make_discussion(id)).await.unwrap();
        }

        // Touch d-1 so it becomes the most recent.
        let mut d1 = gateway.load_discussion("d-1").await.unwrap().unwrap();
        d1.record_turn(make_message(1));
        gateway.save_discussion(&d1).await.unwrap();

        let listed = gateway.list_discussions(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "d-1");
        assert_eq!(listed[0].message_count, 1);
    }

    #[tokio::test]
    async fn test_json_gateway_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path()).unwrap();

        let mut discussion = make_discussion("d-file");
        discussion.record_turn(make_message(1));
        gateway.save_discussion(&discussion).await.unwrap();

        let loaded = gateway.load_discussion("d-file").await.unwrap().unwrap();
        assert_eq!(loaded.id, "d-file");
        assert_eq!(loaded.messages, discussion.messages);
        assert_eq!(loaded.phase_limits, discussion.phase_limits);
    }

    #[tokio::test]
    async fn test_json_gateway_load_absent() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path()).unwrap();
        assert!(gateway.load_discussion("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_gateway_save_message_appends() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path()).unwrap();
        gateway
            .save_discussion(&make_discussion("d-file"))
            .await
            .unwrap();

        gateway.save_message("d-file", &make_message(1)).await.unwrap();
        gateway.save_message("d-file", &make_message(2)).await.unwrap();
        // Out-of-sequence replay is ignored.
        gateway.save_message("d-file", &make_message(1)).await.unwrap();

        let loaded = gateway.load_discussion("d-file").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_json_gateway_delete() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path()).unwrap();
        gateway
            .save_discussion(&make_discussion("d-file"))
            .await
            .unwrap();

        assert!(gateway.delete_discussion("d-file").await.unwrap());
        assert!(!gateway.delete_discussion("d-file").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_gateway_list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path()).unwrap();
        gateway
            .save_discussion(&make_discussion("d-file"))
            .await
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let listed = gateway.list_discussions(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "d-file");
    }
}
