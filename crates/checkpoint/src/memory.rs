//! In-memory checkpoint storage implementation for tests.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{CheckpointStore, SyncLogEntry};

/// In-memory implementation of the CheckpointStore trait.
///
/// Keeps every appended entry, so tests can assert on both the derived
/// checkpoint and the raw audit trail.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<SyncLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries appended so far, in insertion order.
    pub async fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn last_checkpoint(&self, table_name: &str, pk_name: &str) -> Result<Option<i64>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|e| e.table_name == table_name && e.pk_name == pk_name)
            .filter_map(|e| e.pk_int_value)
            .max())
    }

    async fn record_batch(&self, entries: &[SyncLogEntry]) -> Result<()> {
        self.entries.lock().await.extend_from_slice(entries);
        Ok(())
    }
}
