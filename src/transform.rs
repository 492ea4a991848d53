//! Value transformation from raw rows to typed records
//!
//! Transformation is pure: one raw row in, one `Record` out. A malformed
//! value yields an error for that record only; the caller skips it with a
//! warning and the table's pass continues.

use crate::record::{FieldValue, Record, FORMATTED_SUFFIX};
use crate::schema::FieldType;
use crate::source::RawRow;
use crate::sync::TableSyncTarget;
use anyhow::{anyhow, Result};
use chrono::DateTime;
use std::collections::HashMap;

/// Convert one raw row into a record for the target index.
pub fn transform_row(
    target: &TableSyncTarget,
    column_types: &HashMap<String, FieldType>,
    raw: &RawRow,
) -> Result<Record> {
    let mut fields = HashMap::with_capacity(raw.len());
    let mut pk_value = None;

    for (name, value) in raw {
        if target.ignore_fields.contains(name) {
            continue;
        }

        if name == &target.pk_name {
            pk_value = value.clone();
        }

        if target.datetime_format_fields.contains(name) {
            if let Some(epoch) = value {
                fields.insert(
                    format!("{name}{FORMATTED_SUFFIX}"),
                    FieldValue::Timestamp(decode_epoch(&target.table_name, name, epoch)?),
                );
            }
        }

        let typed = match value {
            None => FieldValue::Text(String::new()),
            Some(text) => match column_types.get(name).copied().unwrap_or(FieldType::String) {
                FieldType::Int => FieldValue::Int(text.parse().map_err(|_| {
                    anyhow!(
                        "Non-numeric value {text:?} in integer column `{name}` of table {}",
                        target.table_name
                    )
                })?),
                _ => FieldValue::Text(text.clone()),
            },
        };
        fields.insert(name.clone(), typed);
    }

    let pk_value = pk_value.ok_or_else(|| {
        anyhow!(
            "Primary key column `{}` missing or null in table {}",
            target.pk_name,
            target.table_name
        )
    })?;

    Ok(Record {
        table_name: target.table_name.clone(),
        index_name: target.index_name.clone(),
        pk_name: target.pk_name.clone(),
        pk_type: target.pk_type,
        pk_value,
        fields,
    })
}

/// Decode an epoch-seconds column value into a timestamp.
fn decode_epoch(table: &str, column: &str, value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let epoch: i64 = value.parse().map_err(|_| {
        anyhow!("Non-numeric epoch value {value:?} in column `{column}` of table {table}")
    })?;
    DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| anyhow!("Epoch value {epoch} in column `{column}` of table {table} is out of range"))
}
