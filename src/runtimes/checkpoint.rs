//! Checkpoint records and the pluggable store that persists them.
//!
//! A [`Checkpoint`] captures a position in a run: serialized state, the
//! node it was taken after, and the node to execute next. Per thread,
//! checkpoints form an append-only log; "latest" is insertion order.
//! Stores implement [`CheckpointSaver`]; [`MemorySaver`] is the in-memory
//! implementation used by tests and short-lived runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A persisted position in a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique id of this checkpoint.
    pub id: String,
    /// Node the checkpoint was taken after.
    pub node_id: String,
    /// Node to execute next, `None` once the run is complete.
    pub next_node: Option<String>,
    /// State bytes produced by the graph's serializer.
    pub state: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// New checkpoint with a generated id and the current timestamp.
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        next_node: Option<String>,
        state: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            next_node,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Store failures.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    /// No checkpoint matches the requested thread/id.
    #[error("no checkpoint found for thread '{thread_id}'")]
    #[diagnostic(code(graphflow::checkpoint::not_found))]
    NotFound { thread_id: String },

    /// Backend-specific failure.
    #[error("checkpoint store error: {0}")]
    #[diagnostic(code(graphflow::checkpoint::storage))]
    Storage(String),
}

/// Pluggable checkpoint store.
///
/// Implementations must keep per-thread insertion order: `list` returns
/// oldest first and `get(thread, None)` returns the newest entry.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Append a checkpoint to the thread's log, returning its id.
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint)
        -> Result<String, CheckpointError>;

    /// Fetch a checkpoint by id, or the latest when `checkpoint_id` is
    /// `None`. Returns `Ok(None)` when the thread has no matching entry.
    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>, CheckpointError>;

    /// All checkpoints of a thread, oldest first.
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError>;

    /// Delete one checkpoint from a thread's log.
    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<(), CheckpointError>;

    /// Drop the thread's entire log. Default implementation deletes entry
    /// by entry.
    async fn release(&self, thread_id: &str) -> Result<(), CheckpointError> {
        for checkpoint in self.list(thread_id).await? {
            self.delete(thread_id, &checkpoint.id).await?;
        }
        Ok(())
    }
}

/// Volatile in-memory checkpoint store.
#[derive(Default)]
pub struct MemorySaver {
    threads: Mutex<FxHashMap<String, Vec<Checkpoint>>>,
}

impl MemorySaver {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all threads with at least one checkpoint.
    #[must_use]
    pub fn thread_ids(&self) -> Vec<String> {
        self.threads.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl CheckpointSaver for MemorySaver {
    async fn put(
        &self,
        thread_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<String, CheckpointError> {
        let id = checkpoint.id.clone();
        self.threads
            .lock()
            .entry(thread_id.to_string())
            .or_default()
            .push(checkpoint);
        Ok(id)
    }

    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let threads = self.threads.lock();
        let Some(log) = threads.get(thread_id) else {
            return Ok(None);
        };
        Ok(match checkpoint_id {
            Some(id) => log.iter().find(|cp| cp.id == id).cloned(),
            None => log.last().cloned(),
        })
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        Ok(self
            .threads
            .lock()
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<(), CheckpointError> {
        if let Some(log) = self.threads.lock().get_mut(thread_id) {
            log.retain(|cp| cp.id != checkpoint_id);
        }
        Ok(())
    }

    async fn release(&self, thread_id: &str) -> Result<(), CheckpointError> {
        self.threads.lock().remove(thread_id);
        Ok(())
    }
}
