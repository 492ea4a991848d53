//! Per-table synchronization passes and run orchestration
//!
//! One run resolves the set of table sync targets, then processes each
//! table page by page: read from the checkpoint, transform, gate on
//! cluster load, fan out the writes, and advance the checkpoint once the
//! page's tasks have all joined.

use crate::backpressure::BackpressureGate;
use crate::config::{Config, PkType};
use crate::dispatch::{self, SyncOutcome};
use crate::es::SearchIndex;
use crate::retry::RetryPolicy;
use crate::schema;
use crate::source::BatchReader;
use crate::transform;
use anyhow::{Context, Result};
use checkpoint::CheckpointStore;
use mysql_async::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// A (source table, target index) pair with its per-table overrides.
///
/// Built once at startup from configuration and table discovery;
/// immutable for the run.
#[derive(Debug, Clone)]
pub struct TableSyncTarget {
    pub table_name: String,
    pub index_name: String,
    pub pk_name: String,
    pub pk_type: PkType,
    pub ignore_fields: HashSet<String>,
    pub datetime_format_fields: HashSet<String>,
}

/// Explicit context for one run: configuration plus the source, target,
/// and checkpoint collaborators. Constructed once and passed to each
/// component; no process-wide singletons.
pub struct SyncContext {
    pub config: Config,
    pub pool: mysql_async::Pool,
    pub index: Arc<dyn SearchIndex>,
    pub store: Arc<dyn CheckpointStore>,
    pub gate: BackpressureGate,
    pub retry: RetryPolicy,
}

/// Resolve the index name a table is replicated into: the configured
/// prefix plus either the merge-mapping name or the table name itself.
pub fn resolve_index_name(config: &Config, table: &str) -> String {
    let mut name = table;
    for (merged, tables) in &config.db_options.merge_tables {
        if tables.iter().any(|t| t == table) {
            name = merged;
            break;
        }
    }
    format!("{}{}", config.es.index_prefix, name)
}

/// Whether a table is selected for synchronization.
///
/// A single "*" entry in `sync_tables` selects every table not listed in
/// `ignore_tables`; explicitly listed tables are always selected.
fn is_selected(config: &Config, table: &str) -> bool {
    let opts = &config.db_options;
    let sync_all = opts.sync_tables.len() == 1 && opts.sync_tables[0] == "*";
    (sync_all && !opts.ignore_tables.iter().any(|t| t == table))
        || opts.sync_tables.iter().any(|t| t == table)
}

/// Build the sync target for one table, applying per-table overrides on
/// top of the configured defaults.
pub fn build_target(config: &Config, table: &str) -> TableSyncTarget {
    let opts = &config.db_options;
    let mut pk_name = opts.default_pk.clone();
    let mut pk_type = opts.default_pk_type;
    let mut ignore_fields = HashSet::new();
    let mut datetime_format_fields: HashSet<String> =
        opts.datetime_format_fields.iter().cloned().collect();

    if let Some(overrides) = opts.tables.get(table) {
        if let Some(pk) = &overrides.pk {
            pk_name = pk.clone();
        }
        if let Some(t) = overrides.pk_type {
            pk_type = t;
        }
        ignore_fields.extend(overrides.ignore_fields.iter().cloned());
        datetime_format_fields.extend(overrides.datetime_format_fields.iter().cloned());
    }

    TableSyncTarget {
        table_name: table.to_string(),
        index_name: resolve_index_name(config, table),
        pk_name,
        pk_type,
        ignore_fields,
        datetime_format_fields,
    }
}

/// List source tables, apply the sync/ignore selection, and make sure
/// every selected table's target index exists.
pub async fn resolve_targets(ctx: &SyncContext) -> Result<Vec<TableSyncTarget>> {
    let mut conn = ctx
        .pool
        .get_conn()
        .await
        .context("Failed to connect to MySQL")?;
    let tables: Vec<String> = conn
        .query("SHOW TABLES")
        .await
        .context("Failed to list source tables")?;
    drop(conn);

    let mut targets = Vec::new();
    for table in &tables {
        if !is_selected(&ctx.config, table) {
            continue;
        }
        let target = build_target(&ctx.config, table);
        if !ctx.index.index_exists(&target.index_name).await? {
            info!("Creating index `{}`", target.index_name);
            ctx.index.create_index(&target.index_name).await?;
        }
        targets.push(target);
    }
    Ok(targets)
}

/// Synchronize one table.
///
/// A schema-introspection or page-read failure aborts this table's pass
/// and propagates; per-record failures are contained in the outcome.
pub async fn sync_table(ctx: &SyncContext, target: &TableSyncTarget) -> Result<SyncOutcome> {
    let mut conn = ctx.pool.get_conn().await?;
    let column_types = schema::collect_table_schema(&mut conn, &target.table_name).await?;

    // Only integer keys resume from a durable checkpoint; string-keyed
    // tables are re-scanned from the beginning each run.
    let checkpoint = match target.pk_type {
        PkType::Int => {
            ctx.store
                .last_checkpoint(&target.table_name, &target.pk_name)
                .await?
        }
        PkType::Str => None,
    };
    if let Some(value) = checkpoint {
        info!(
            "Resuming table {} after {} = {value}",
            target.table_name, target.pk_name
        );
    }

    let mut reader = BatchReader::new(
        conn,
        target,
        checkpoint,
        ctx.config.page_size,
        ctx.config.max_records_per_table,
    );
    let mut outcome = SyncOutcome::default();

    while let Some(page) = reader.next_page().await? {
        let mut records = Vec::with_capacity(page.len());
        for raw in &page {
            match transform::transform_row(target, &column_types, raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed row in table {}: {e:#}", target.table_name),
            }
        }

        ctx.gate.admit(ctx.index.as_ref()).await;
        let result = dispatch::dispatch_page(Arc::clone(&ctx.index), &ctx.retry, records).await;

        // The checkpoint advances here, strictly after the page's tasks
        // have joined; tasks never write to the store themselves.
        ctx.store.record_batch(&result.log_entries).await?;
        outcome.merge(result.outcome);
    }

    info!("Table {} synchronized: {outcome}", target.table_name);
    Ok(outcome)
}

/// Run a full pass over every selected table.
///
/// A table-level failure aborts that table only; the first one is
/// surfaced in the aggregate outcome and the remaining tables continue.
pub async fn run(ctx: &SyncContext) -> Result<SyncOutcome> {
    let targets = resolve_targets(ctx).await?;
    info!("Synchronizing {} tables", targets.len());

    let mut outcome = SyncOutcome::default();
    for target in &targets {
        match sync_table(ctx, target).await {
            Ok(table_outcome) => outcome.merge(table_outcome),
            Err(e) => {
                warn!("Table {} pass aborted: {e:#}", target.table_name);
                if outcome.first_error.is_none() {
                    outcome.first_error = Some(format!("{e:#}"));
                }
            }
        }
    }
    Ok(outcome)
}
