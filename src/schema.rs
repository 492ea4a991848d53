//! MySQL schema introspection and type mapping
//!
//! Column values arrive from the wire textually, so the declared column
//! types drive how the transformer coerces each field.

use anyhow::{anyhow, Context, Result};
use mysql_async::prelude::*;
use std::collections::HashMap;

/// Semantic type of a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    String,
    Date,
    Time,
    DateTime,
}

/// Map a declared MySQL column type to its semantic field type.
///
/// The prefix before any parenthesized length/precision is matched
/// (`int(11)` -> Int, `varchar(255)` -> String); unrecognized types fall
/// back to String.
pub fn field_type_from_declared(declared: &str) -> FieldType {
    let name = declared.split('(').next().unwrap_or(declared).trim();
    match name {
        "int" | "smallint" | "tinyint" => FieldType::Int,
        "date" => FieldType::Date,
        "time" => FieldType::Time,
        "datetime" => FieldType::DateTime,
        _ => FieldType::String,
    }
}

/// Collect the column name -> semantic type mapping for one table.
///
/// A metadata-query failure here is fatal for the table's pass: values
/// cannot be transformed safely without their types.
pub async fn collect_table_schema(
    conn: &mut mysql_async::Conn,
    table: &str,
) -> Result<HashMap<String, FieldType>> {
    let rows: Vec<mysql_async::Row> = conn
        .query(format!("SHOW COLUMNS FROM {table}"))
        .await
        .with_context(|| format!("Failed to introspect columns of table {table}"))?;

    let mut types = HashMap::with_capacity(rows.len());
    for row in rows {
        let field: String = row
            .get(0)
            .ok_or_else(|| anyhow!("Missing column name in SHOW COLUMNS for table {table}"))?;
        let declared: Option<String> = row.get::<Option<String>, _>(1).flatten();
        let field_type = declared
            .as_deref()
            .map(field_type_from_declared)
            .unwrap_or(FieldType::String);
        types.insert(field, field_type);
    }

    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert_eq!(field_type_from_declared("int(11)"), FieldType::Int);
        assert_eq!(field_type_from_declared("int"), FieldType::Int);
        assert_eq!(field_type_from_declared("smallint(6)"), FieldType::Int);
        assert_eq!(field_type_from_declared("tinyint(1)"), FieldType::Int);
    }

    #[test]
    fn test_temporal_types() {
        assert_eq!(field_type_from_declared("date"), FieldType::Date);
        assert_eq!(field_type_from_declared("time"), FieldType::Time);
        assert_eq!(field_type_from_declared("datetime"), FieldType::DateTime);
    }

    #[test]
    fn test_unrecognized_types_default_to_string() {
        assert_eq!(field_type_from_declared("varchar(255)"), FieldType::String);
        assert_eq!(field_type_from_declared("text"), FieldType::String);
        assert_eq!(field_type_from_declared("decimal(10,2)"), FieldType::String);
        assert_eq!(field_type_from_declared("bigint(20)"), FieldType::String);
        assert_eq!(field_type_from_declared(""), FieldType::String);
    }
}
