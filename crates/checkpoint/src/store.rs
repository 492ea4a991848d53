//! Checkpoint storage trait and types
//!
//! This module defines the CheckpointStore trait for backend-agnostic
//! checkpoint and sync-log operations, plus shared types.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One row of the sync log.
///
/// A `SyncLogEntry` is appended for every record that was successfully
/// reconciled against the target index (inserted, updated, or confirmed
/// as a no-op). The entries double as the audit trail and as the source
/// of the per-table checkpoint: the checkpoint for `(table, pk_name)` is
/// the maximum `pk_int_value` recorded so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Source table name
    pub table_name: String,
    /// Primary-key column name
    pub pk_name: String,
    /// Primary-key value as rendered into the document id
    pub pk_value: String,
    /// Integer primary-key value, when the table uses integer keys.
    /// None for string-keyed tables, which do not checkpoint.
    pub pk_int_value: Option<i64>,
    /// Field mapping that was written (or confirmed) in the index
    pub field_values: serde_json::Value,
}

/// Trait for checkpoint storage operations.
///
/// This trait abstracts the storage backend for checkpoint operations,
/// allowing the same sync logic to work with:
/// - MySQL sync-log table (`MySqlStore`)
/// - In-memory storage for tests (`MemoryStore`)
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Create the backing schema if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()>;

    /// Read the last checkpointed integer primary-key value for a table.
    ///
    /// Returns None if the table has never been synchronized.
    async fn last_checkpoint(&self, table_name: &str, pk_name: &str) -> Result<Option<i64>>;

    /// Append a batch of sync-log entries.
    ///
    /// Called once per page, after all of the page's write tasks have
    /// joined. This is the single logical writer that advances the
    /// checkpoint; entries are never appended from in-flight write tasks.
    async fn record_batch(&self, entries: &[SyncLogEntry]) -> Result<()>;
}
