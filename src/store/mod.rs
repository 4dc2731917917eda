//! SQLite persistence for flattened indicator batches.
//!
//! The schema follows the data: the table is created from the first batch's
//! columns (affinity inferred from the first non-null value per column) and
//! widened with `ALTER TABLE ... ADD COLUMN` when a later batch carries new
//! columns. Appends are plain inserts: there is no primary key and no
//! deduplication, so reloading the same query duplicates rows. Callers that
//! need uniqueness must enforce it themselves.

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql};
use tracing::debug;

use crate::error::AppError;
use crate::io::flatten::{FlatBatch, Scalar};

/// One scoped SQLite connection, acquired per load/report operation.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = Connection::open(path).map_err(|e| {
            AppError::Storage(format!("failed to open database '{}': {e}", path.display()))
        })?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("failed to open in-memory database: {e}")))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Append a flattened batch to `table`, creating or widening the table
    /// as needed. Returns the number of rows inserted.
    ///
    /// The whole append runs in one transaction: on any failure nothing from
    /// this batch is committed, while rows from earlier appends stay intact.
    pub fn append_batch(&mut self, table: &str, batch: &FlatBatch) -> Result<usize, AppError> {
        validate_table_name(table)?;
        if batch.is_empty() {
            debug!(table, "empty batch, nothing to append");
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("failed to begin transaction: {e}")))?;

        let existing = table_columns(&tx, table)?;
        if existing.is_empty() {
            create_table(&tx, table, batch)?;
        } else {
            widen_table(&tx, table, batch, &existing)?;
        }

        let column_list = batch
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; batch.columns.len()].join(", ");
        let sql = format!("INSERT INTO {} ({column_list}) VALUES ({placeholders})", quote_ident(table));

        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| AppError::Storage(format!("failed to prepare insert: {e}")))?;
            for row in &batch.rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))
                    .map_err(|e| AppError::Storage(format!("failed to insert row: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Storage(format!("failed to commit append: {e}")))?;

        debug!(table, rows = batch.len(), "appended batch");
        Ok(batch.len())
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(SqlValue::Null),
            Scalar::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Scalar::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Scalar::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
        })
    }
}

/// Table names are interpolated into SQL, so only bare identifiers pass.
pub fn validate_table_name(name: &str) -> Result<(), AppError> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(AppError::Query(format!("invalid table name: '{name}'")))
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names of `table`, empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, AppError> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::Storage(format!("failed to read table info: {e}")))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| AppError::Storage(format!("failed to read table info: {e}")))?;
    Ok(columns)
}

fn create_table(conn: &Connection, table: &str, batch: &FlatBatch) -> Result<(), AppError> {
    let column_defs = batch
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{} {}", quote_ident(name), column_affinity(batch, idx)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("CREATE TABLE {} ({column_defs})", quote_ident(table));
    conn.execute(&sql, [])
        .map_err(|e| AppError::Storage(format!("failed to create table '{table}': {e}")))?;
    Ok(())
}

fn widen_table(
    conn: &Connection,
    table: &str,
    batch: &FlatBatch,
    existing: &[String],
) -> Result<(), AppError> {
    for (idx, name) in batch.columns.iter().enumerate() {
        let known = existing.iter().any(|c| c.eq_ignore_ascii_case(name));
        if known {
            continue;
        }
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(name),
            column_affinity(batch, idx)
        );
        conn.execute(&sql, []).map_err(|e| {
            AppError::Storage(format!("failed to add column '{name}' to '{table}': {e}"))
        })?;
    }
    Ok(())
}

/// Affinity for a column, taken from its first non-null value in the batch.
fn column_affinity(batch: &FlatBatch, idx: usize) -> &'static str {
    for row in &batch.rows {
        match row.get(idx) {
            Some(Scalar::Integer(_)) | Some(Scalar::Bool(_)) => return "INTEGER",
            Some(Scalar::Real(_)) => return "REAL",
            Some(Scalar::Text(_)) => return "TEXT",
            Some(Scalar::Null) | None => continue,
        }
    }
    "TEXT"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::flatten::flatten_records;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn fixture_records() -> Vec<crate::data::worldbank::RawRecord> {
        let records = json!([
            {
                "indicator": {"id": "SP.POP.TOTL", "value": "Population, total"},
                "country": {"id": "CA", "value": "Canada"},
                "countryiso3code": "CAN",
                "date": "2000",
                "value": 30685730,
                "unit": "",
                "obs_status": "",
                "decimal": 0
            },
            {
                "indicator": {"id": "SP.POP.TOTL", "value": "Population, total"},
                "country": {"id": "US", "value": "United States"},
                "countryiso3code": "USA",
                "date": "2000",
                "value": 282162411,
                "unit": "",
                "obs_status": "",
                "decimal": 0
            }
        ]);
        serde_json::from_value(records).unwrap()
    }

    #[test]
    fn creates_table_from_first_batch_and_round_trips_values() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = flatten_records(&fixture_records());

        let appended = store.append_batch("world_data_bank", &batch).unwrap();
        assert_eq!(appended, 2);

        let columns = table_columns(store.connection(), "world_data_bank").unwrap();
        for expected in [
            "COUNTRYISO3CODE",
            "DATE",
            "VALUE",
            "INDICATOR_ID",
            "INDICATOR_VALUE",
            "COUNTRY_ID",
            "COUNTRY_VALUE",
        ] {
            assert!(columns.iter().any(|c| c == expected), "missing {expected}");
        }

        let mut stmt = store
            .connection()
            .prepare(
                "SELECT COUNTRYISO3CODE, DATE, VALUE FROM world_data_bank ORDER BY COUNTRYISO3CODE",
            )
            .unwrap();
        let rows: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            rows,
            vec![
                ("CAN".to_string(), "2000".to_string(), 30685730),
                ("USA".to_string(), "2000".to_string(), 282162411),
            ]
        );
    }

    #[test]
    fn appends_are_additive_without_dedup() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = flatten_records(&fixture_records());

        store.append_batch("t", &batch).unwrap();
        store.append_batch("t", &batch).unwrap();

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn widens_the_table_for_new_columns() {
        let mut store = Store::open_in_memory().unwrap();

        let first: Vec<crate::data::worldbank::RawRecord> =
            serde_json::from_value(json!([{"date": "2000", "value": 1}])).unwrap();
        let second: Vec<crate::data::worldbank::RawRecord> =
            serde_json::from_value(json!([{"date": "2001", "value": 2, "obs_status": "E"}]))
                .unwrap();

        store.append_batch("t", &flatten_records(&first)).unwrap();
        store.append_batch("t", &flatten_records(&second)).unwrap();

        let status: Vec<Option<String>> = store
            .connection()
            .prepare("SELECT OBS_STATUS FROM t ORDER BY DATE")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        // The pre-widening row reads back as NULL in the new column.
        assert_eq!(status, vec![None, Some("E".to_string())]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut store = Store::open_in_memory().unwrap();
        let appended = store.append_batch("t", &FlatBatch::default()).unwrap();
        assert_eq!(appended, 0);
        let tables: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 't'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn rejects_non_identifier_table_names() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = flatten_records(&fixture_records());
        assert_matches!(
            store.append_batch("bad name; --", &batch),
            Err(AppError::Query(_))
        );
        assert_matches!(store.append_batch("1table", &batch), Err(AppError::Query(_)));
    }
}
