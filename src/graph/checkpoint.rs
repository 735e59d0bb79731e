//! Checkpoint persistence for suspendable runs
//!
//! A checkpoint is the whole run (state, next node, step count and resolved
//! settings) serialized as one JSON document and written in a single
//! statement, so a crashed or abandoned write never leaves a partial record.

use crate::graph::nodes::NodeId;
use crate::graph::state::WorkflowState;
use crate::types::{AppError, Result};
use crate::utils::settings::ResearchSettings;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::{Builder, Connection};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    AwaitingReview,
    Completed,
    Ended,
}

impl RunStatus {
    /// Completed and ended runs can never continue
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Ended)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::AwaitingReview => "awaiting_review",
            RunStatus::Completed => "completed",
            RunStatus::Ended => "ended",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: WorkflowState,
    /// Node to run when the thread continues
    pub next_node: Option<NodeId>,
    pub status: RunStatus,
    /// Nodes executed so far, counted against the recursion limit
    pub steps_taken: usize,
    pub settings: ResearchSettings,
    pub updated_at: DateTime<Utc>,
}

/// Storage for checkpoints keyed by thread id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Insert or replace the checkpoint for its thread
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Remove a thread. Returns whether it existed.
    async fn delete(&self, thread_id: &str) -> Result<bool>;
}

/// Process-local checkpoint store
///
/// Without a retention window every run stays in memory until it is
/// deleted. With one, finished runs older than the window are dropped on the
/// next write. Runs awaiting review are always kept.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
    retention: Option<Duration>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop finished runs once they are older than `retention`
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    fn prune(checkpoints: &mut HashMap<String, Checkpoint>, cutoff: DateTime<Utc>) {
        let before = checkpoints.len();
        checkpoints.retain(|_, c| !(c.status.is_terminal() && c.updated_at < cutoff));
        let pruned = before - checkpoints.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped expired checkpoints");
        }
    }

    pub fn len(&self) -> usize {
        self.checkpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.read().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().get(thread_id).cloned())
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write();
        if let Some(retention) = self.retention {
            Self::prune(&mut checkpoints, Utc::now() - retention);
        }
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        Ok(self.checkpoints.write().remove(thread_id).is_some())
    }
}

/// SQLite checkpoint store on libsql
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Open (or create) a database file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Checkpoint(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        Self::open_local(&path.to_string_lossy()).await
    }

    /// In-memory database, lost when the store is dropped
    pub async fn in_memory() -> Result<Self> {
        Self::open_local(":memory:").await
    }

    async fn open_local(location: &str) -> Result<Self> {
        let db = Builder::new_local(location)
            .build()
            .await
            .map_err(|e| AppError::Checkpoint(format!("Failed to open {}: {}", location, e)))?;
        let conn = db
            .connect()
            .map_err(|e| AppError::Checkpoint(format!("Failed to get connection: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Checkpoint(format!("Failed to create checkpoints table: {}", e)))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let mut rows = self
            .conn
            .query("SELECT data FROM checkpoints WHERE thread_id = ?", [thread_id])
            .await
            .map_err(|e| AppError::Checkpoint(format!("Failed to query checkpoint: {}", e)))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Checkpoint(e.to_string()))?
        else {
            return Ok(None);
        };
        let data: String = row
            .get(0)
            .map_err(|e| AppError::Checkpoint(e.to_string()))?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| AppError::Checkpoint(format!("Corrupt checkpoint {}: {}", thread_id, e)))
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        let data = serde_json::to_string(checkpoint)?;
        self.conn
            .execute(
                "INSERT INTO checkpoints (thread_id, status, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    status = excluded.status,
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                libsql::params![
                    checkpoint.thread_id.as_str(),
                    checkpoint.status.as_str(),
                    data,
                    checkpoint.updated_at.timestamp()
                ],
            )
            .await
            .map_err(|e| AppError::Checkpoint(format!("Failed to write checkpoint: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM checkpoints WHERE thread_id = ?", [thread_id])
            .await
            .map_err(|e| AppError::Checkpoint(format!("Failed to delete checkpoint: {}", e)))?;
        Ok(affected > 0)
    }
}
