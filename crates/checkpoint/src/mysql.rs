//! MySQL-backed checkpoint storage implementation.
//!
//! Stores sync-log entries in a dedicated table inside the source
//! database, so a restarted process resumes incremental scans instead of
//! re-reading every table from the beginning.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;

use crate::store::{CheckpointStore, SyncLogEntry};

/// Name of the sync-log table created in the source database.
pub const SYNC_LOG_TABLE: &str = "es_sync_log";

/// MySQL implementation of the CheckpointStore trait.
///
/// One row is appended per successfully reconciled record; the checkpoint
/// for a table is read back as `MAX(pk_int_value)`.
pub struct MySqlStore {
    pool: mysql_async::Pool,
}

impl MySqlStore {
    /// Create a new MySqlStore backed by the given connection pool.
    pub fn new(pool: mysql_async::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for MySqlStore {
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Failed to connect to MySQL for sync-log schema setup")?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {SYNC_LOG_TABLE} (
                id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                table_name VARCHAR(255) NOT NULL,
                pk_name VARCHAR(255) NOT NULL,
                pk_value VARCHAR(255) NOT NULL,
                pk_int_value BIGINT NULL,
                field_values JSON NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                KEY idx_table_pk (table_name, pk_name, pk_int_value)
            )"
        );
        conn.query_drop(ddl).await?;
        tracing::debug!("Ensured sync-log table {SYNC_LOG_TABLE} exists");
        Ok(())
    }

    async fn last_checkpoint(&self, table_name: &str, pk_name: &str) -> Result<Option<i64>> {
        let mut conn = self.pool.get_conn().await?;

        let query = format!(
            "SELECT MAX(pk_int_value) FROM {SYNC_LOG_TABLE}
             WHERE table_name = ? AND pk_name = ?"
        );
        let row: Option<Option<i64>> = conn.exec_first(query, (table_name, pk_name)).await?;

        Ok(row.flatten())
    }

    async fn record_batch(&self, entries: &[SyncLogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get_conn().await?;

        let stmt = format!(
            "INSERT INTO {SYNC_LOG_TABLE}
             (table_name, pk_name, pk_value, pk_int_value, field_values)
             VALUES (?, ?, ?, ?, ?)"
        );
        let mut params = Vec::with_capacity(entries.len());
        for e in entries {
            let values = serde_json::to_string(&e.field_values).with_context(|| {
                format!(
                    "Failed to serialize sync-log field values for `{}` in table {}",
                    e.pk_value, e.table_name
                )
            })?;
            params.push((
                e.table_name.clone(),
                e.pk_name.clone(),
                e.pk_value.clone(),
                e.pk_int_value,
                values,
            ));
        }
        conn.exec_batch(stmt, params).await?;

        tracing::debug!("Appended {} sync-log entries", entries.len());
        Ok(())
    }
}
