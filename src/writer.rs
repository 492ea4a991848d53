//! Diff-aware reconciliation of records against the target index
//!
//! Writing only happens when the computed document differs from what the
//! index already holds, so repeated runs over unchanged data issue no
//! writes at all.

use crate::es::{Document, SearchIndex};
use crate::record::{Record, FORMATTED_SUFFIX};
use anyhow::Result;
use tracing::{debug, info};

/// Outcome of reconciling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Inserted,
    Updated,
    Skipped,
}

/// Reconcile one record with the target index.
///
/// The existence check completes and is observed before the insert/update
/// decision; within a single record this read-before-write ordering is
/// the only ordering that matters.
pub async fn reconcile(index: &dyn SearchIndex, record: &Record) -> Result<WriteAction> {
    let existing = index
        .get_document(&record.index_name, &record.pk_value)
        .await?;

    match existing {
        None => {
            index
                .create_document(&record.index_name, &record.pk_value, &record.to_body())
                .await?;
            info!(
                "Indexed `{}` from table {} into `{}`",
                record.pk_value, record.table_name, record.index_name
            );
            Ok(WriteAction::Inserted)
        }
        Some(document) => {
            if has_diff(&document, record) {
                index
                    .update_document(&record.index_name, &record.pk_value, &record.to_body())
                    .await?;
                info!(
                    "Updated `{}` from table {} in `{}`",
                    record.pk_value, record.table_name, record.index_name
                );
                Ok(WriteAction::Updated)
            } else {
                debug!(
                    "Document `{}` in `{}` is up to date",
                    record.pk_value, record.index_name
                );
                Ok(WriteAction::Skipped)
            }
        }
    }
}

/// Compare an indexed document against a record, field by field.
///
/// Derived `_formatted` fields are write-time conveniences and are
/// excluded from the comparison. Both sides are normalized to strings to
/// absorb representation drift between the source and the index.
pub fn has_diff(existing: &Document, record: &Record) -> bool {
    for (name, indexed) in existing {
        if name.ends_with(FORMATTED_SUFFIX) {
            continue;
        }
        if let Some(value) = record.fields.get(name) {
            let source = value.diff_string();
            let target = json_diff_string(indexed);
            if source != target {
                debug!("Diff on `{name}`: source {source:?} -> index {target:?}");
                return true;
            }
        }
    }
    false
}

/// Normalized string form of an indexed JSON value.
fn json_diff_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
