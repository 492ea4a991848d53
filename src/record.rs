//! Transformed record and field value types
//!
//! `FieldValue` is the closed tagged type produced once by the value
//! transformer and consumed uniformly by the diff-aware writer, replacing
//! any per-record dynamic type switching downstream.

use crate::config::PkType;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Suffix of derived timestamp fields. Derived fields are written to the
/// index but excluded from diff comparisons.
pub const FORMATTED_SUFFIX: &str = "_formatted";

/// A single transformed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit integer
    Int(i64),
    /// String value; NULL source values transform to the empty string
    Text(String),
    /// Decoded epoch timestamp for derived `_formatted` fields
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// JSON rendering used for document bodies.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Text(s) => serde_json::Value::from(s.as_str()),
            FieldValue::Timestamp(ts) => serde_json::Value::from(ts.to_rfc3339()),
        }
    }

    /// Normalized string form used for diffing against indexed documents.
    pub fn diff_string(&self) -> String {
        match self {
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339(),
        }
    }
}

/// One source row, transformed and ready for reconciliation.
///
/// Created by the value transformer, consumed exactly once by the
/// diff-aware writer.
#[derive(Debug, Clone)]
pub struct Record {
    pub table_name: String,
    pub index_name: String,
    pub pk_name: String,
    pub pk_type: PkType,
    /// String-rendered primary-key value, used as the document id
    pub pk_value: String,
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Full field mapping as a JSON document body.
    pub fn to_body(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// Sync-log entry recording this record's successful reconciliation.
    pub fn to_log_entry(&self) -> checkpoint::SyncLogEntry {
        let pk_int_value = match self.pk_type {
            PkType::Int => self.pk_value.parse().ok(),
            PkType::Str => None,
        };
        checkpoint::SyncLogEntry {
            table_name: self.table_name.clone(),
            pk_name: self.pk_name.clone(),
            pk_value: self.pk_value.clone(),
            pk_int_value,
            field_values: serde_json::Value::Object(self.to_body()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_json_rendering() {
        assert_eq!(FieldValue::Int(42).to_json(), serde_json::json!(42));
        assert_eq!(
            FieldValue::Text("hello".to_string()).to_json(),
            serde_json::json!("hello")
        );
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            FieldValue::Timestamp(ts).to_json(),
            serde_json::json!(ts.to_rfc3339())
        );
    }

    #[test]
    fn test_diff_string_normalization() {
        assert_eq!(FieldValue::Int(7).diff_string(), "7");
        assert_eq!(FieldValue::Text(String::new()).diff_string(), "");
    }

    #[test]
    fn test_log_entry_for_string_keyed_record() {
        let record = Record {
            table_name: "docs".to_string(),
            index_name: "docs".to_string(),
            pk_name: "uuid".to_string(),
            pk_type: PkType::Str,
            pk_value: "a1b2".to_string(),
            fields: HashMap::new(),
        };
        let entry = record.to_log_entry();
        assert_eq!(entry.pk_int_value, None);
        assert_eq!(entry.pk_value, "a1b2");
    }

    #[test]
    fn test_log_entry_for_int_keyed_record() {
        let record = Record {
            table_name: "users".to_string(),
            index_name: "users".to_string(),
            pk_name: "id".to_string(),
            pk_type: PkType::Int,
            pk_value: "1024".to_string(),
            fields: HashMap::from([("id".to_string(), FieldValue::Int(1024))]),
        };
        let entry = record.to_log_entry();
        assert_eq!(entry.pk_int_value, Some(1024));
        assert_eq!(entry.field_values["id"], serde_json::json!(1024));
    }
}
