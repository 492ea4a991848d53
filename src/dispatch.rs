//! Concurrent per-record write dispatch and outcome aggregation
//!
//! Every record in a page is dispatched as an independent task; the
//! dispatcher joins all tasks before reporting, and each task produces a
//! local result that is merged only at the join point. No shared counter
//! is mutated from inside a task.

use crate::es::SearchIndex;
use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::writer::{self, WriteAction};
use checkpoint::SyncLogEntry;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

/// Aggregate result of a run, a table pass, or a single page.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    /// First hard per-record or per-table error encountered, if any
    pub first_error: Option<String>,
}

impl SyncOutcome {
    pub fn merge(&mut self, other: SyncOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted={} updated={} skipped={} failed={}",
            self.inserted, self.updated, self.skipped, self.failed
        )
    }
}

/// Result of one page's dispatch: aggregate counts plus the sync-log
/// entries for every successfully reconciled record. The entries are
/// appended by the page loop after the join, never by the tasks.
#[derive(Debug, Default)]
pub struct PageResult {
    pub outcome: SyncOutcome,
    pub log_entries: Vec<SyncLogEntry>,
}

enum TaskResult {
    Done(WriteAction, SyncLogEntry),
    Failed(String),
}

/// Fan out one reconcile task per record and join them all.
pub async fn dispatch_page(
    index: Arc<dyn SearchIndex>,
    retry: &RetryPolicy,
    records: Vec<Record>,
) -> PageResult {
    let mut handles = Vec::with_capacity(records.len());
    for record in records {
        let index = Arc::clone(&index);
        let retry = retry.clone();
        handles.push(tokio::spawn(async move {
            match retry.run(|| writer::reconcile(index.as_ref(), &record)).await {
                Ok(action) => TaskResult::Done(action, record.to_log_entry()),
                Err(e) => {
                    warn!(
                        "Giving up on `{}` in `{}` after {} attempts: {e:#}",
                        record.pk_value,
                        record.index_name,
                        retry.max_attempts()
                    );
                    TaskResult::Failed(format!("{e:#}"))
                }
            }
        }));
    }

    let mut result = PageResult::default();
    for joined in join_all(handles).await {
        match joined {
            Ok(TaskResult::Done(action, entry)) => {
                match action {
                    WriteAction::Inserted => result.outcome.inserted += 1,
                    WriteAction::Updated => result.outcome.updated += 1,
                    WriteAction::Skipped => result.outcome.skipped += 1,
                }
                result.log_entries.push(entry);
            }
            Ok(TaskResult::Failed(message)) => {
                result.outcome.failed += 1;
                if result.outcome.first_error.is_none() {
                    result.outcome.first_error = Some(message);
                }
            }
            Err(join_err) => {
                result.outcome.failed += 1;
                if result.outcome.first_error.is_none() {
                    result.outcome.first_error = Some(format!("Write task panicked: {join_err}"));
                }
            }
        }
    }
    result
}
