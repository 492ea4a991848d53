//! Paginated batch reading of MySQL tables
//!
//! The reader owns its connection for the duration of one table's
//! pagination and produces raw rows as textual column maps, ordered
//! ascending by primary key.

use crate::sync::TableSyncTarget;
use anyhow::{anyhow, Context, Result};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use std::collections::HashMap;

/// One raw row: column name -> textual value, NULL preserved as None.
pub type RawRow = HashMap<String, Option<String>>;

/// Cursor-paginated reader for one table.
///
/// Issues bounded page queries (`WHERE pk > cursor ORDER BY pk LIMIT n`)
/// until a short page signals exhaustion or the per-run record cap is
/// reached. The in-run cursor advances to the last row's primary key
/// after each page; durable checkpoint advancement is the page loop's
/// concern, not the reader's.
pub struct BatchReader {
    conn: mysql_async::Conn,
    table_name: String,
    pk_name: String,
    cursor: Option<String>,
    page_size: u64,
    max_records: u64,
    fetched: u64,
    exhausted: bool,
}

impl BatchReader {
    pub fn new(
        conn: mysql_async::Conn,
        target: &TableSyncTarget,
        checkpoint: Option<i64>,
        page_size: u64,
        max_records: u64,
    ) -> Self {
        Self {
            conn,
            table_name: target.table_name.clone(),
            pk_name: target.pk_name.clone(),
            cursor: checkpoint.map(|value| value.to_string()),
            page_size,
            max_records,
            fetched: 0,
            exhausted: false,
        }
    }

    /// Fetch the next page of raw rows.
    ///
    /// Returns None once the table is exhausted or the per-run cap is
    /// reached. An empty table yields None on the first call without
    /// error; a page-read failure aborts the table's pass.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRow>>> {
        if self.exhausted || self.fetched >= self.max_records {
            return Ok(None);
        }
        let limit = self.page_size.min(self.max_records - self.fetched);

        let rows: Vec<mysql_async::Row> = match &self.cursor {
            Some(cursor) => {
                let query = format!(
                    "SELECT * FROM {table} WHERE {pk} > ? ORDER BY {pk} LIMIT {limit}",
                    table = self.table_name,
                    pk = self.pk_name,
                );
                self.conn.exec(query, (cursor.as_str(),)).await
            }
            None => {
                let query = format!(
                    "SELECT * FROM {table} ORDER BY {pk} LIMIT {limit}",
                    table = self.table_name,
                    pk = self.pk_name,
                );
                self.conn.query(query).await
            }
        }
        .with_context(|| format!("Page read failed for table {}", self.table_name))?;

        if (rows.len() as u64) < limit {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        let page: Vec<RawRow> = rows.iter().map(row_to_raw).collect();
        self.fetched += page.len() as u64;

        let last_pk = page
            .last()
            .and_then(|row| row.get(&self.pk_name))
            .and_then(|value| value.clone())
            .ok_or_else(|| {
                anyhow!(
                    "Table {} returned a row without primary key `{}`",
                    self.table_name,
                    self.pk_name
                )
            })?;
        self.cursor = Some(last_pk);

        Ok(Some(page))
    }
}

fn row_to_raw(row: &mysql_async::Row) -> RawRow {
    let mut map = HashMap::with_capacity(row.len());
    for (i, column) in row.columns_ref().iter().enumerate() {
        // DATE and DATETIME share the same wire value; the column type
        // decides the rendering, so a DATETIME at midnight keeps its
        // time-of-day part.
        let date_only = column.column_type() == ColumnType::MYSQL_TYPE_DATE;
        let value = row.as_ref(i).and_then(|v| render_value(v, date_only));
        map.insert(column.name_str().to_string(), value);
    }
    map
}

/// Render a MySQL wire value textually, preserving NULL.
fn render_value(value: &mysql_async::Value, date_only: bool) -> Option<String> {
    use mysql_async::Value;

    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Date(y, mo, d, _, _, _, _) if date_only => Some(format!("{y:04}-{mo:02}-{d:02}")),
        Value::Date(y, mo, d, h, mi, s, _) => {
            Some(format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"))
        }
        Value::Time(negative, days, h, m, s, _) => {
            let hours = u32::from(*h) + days * 24;
            let sign = if *negative { "-" } else { "" };
            Some(format!("{sign}{hours:02}:{m:02}:{s:02}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::Value;

    #[test]
    fn test_render_null() {
        assert_eq!(render_value(&Value::NULL, false), None);
    }

    #[test]
    fn test_render_numeric_values() {
        assert_eq!(render_value(&Value::Int(-5), false), Some("-5".to_string()));
        assert_eq!(render_value(&Value::UInt(42), false), Some("42".to_string()));
        assert_eq!(
            render_value(&Value::Double(1.5), false),
            Some("1.5".to_string())
        );
    }

    #[test]
    fn test_render_bytes_as_utf8() {
        assert_eq!(
            render_value(&Value::Bytes(b"hello".to_vec()), false),
            Some("hello".to_string())
        );
    }

    #[test]
    fn test_render_date_and_datetime() {
        assert_eq!(
            render_value(&Value::Date(2024, 3, 9, 0, 0, 0, 0), true),
            Some("2024-03-09".to_string())
        );
        assert_eq!(
            render_value(&Value::Date(2024, 3, 9, 13, 5, 1, 0), false),
            Some("2024-03-09 13:05:01".to_string())
        );
    }

    #[test]
    fn test_midnight_datetime_keeps_its_time_part() {
        assert_eq!(
            render_value(&Value::Date(2024, 3, 9, 0, 0, 0, 0), false),
            Some("2024-03-09 00:00:00".to_string())
        );
    }

    #[test]
    fn test_date_column_ignores_time_fields() {
        assert_eq!(
            render_value(&Value::Date(2024, 3, 9, 13, 5, 1, 0), true),
            Some("2024-03-09".to_string())
        );
    }

    #[test]
    fn test_render_time() {
        assert_eq!(
            render_value(&Value::Time(false, 1, 2, 30, 0, 0), false),
            Some("26:30:00".to_string())
        );
        assert_eq!(
            render_value(&Value::Time(true, 0, 0, 10, 0, 0), false),
            Some("-00:10:00".to_string())
        );
    }
}
