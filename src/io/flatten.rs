//! Flatten nested API records into tabular batches.
//!
//! Nested objects are flattened depth-first with underscore-joined key paths
//! and every resulting column name is upper-cased:
//! `{"indicator": {"id": ...}}` becomes column `INDICATOR_ID`. Downstream
//! SQL consumers depend on these exact column identities (`COUNTRY_ID`,
//! `DATE`, `VALUE`, `INDICATOR_ID`, ...), so the mapping must stay stable.

use serde_json::{Map, Value};

use crate::data::worldbank::RawRecord;

/// Scalar cell value after flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

/// One flattened batch: ordered column names plus rows aligned to them.
///
/// Cells for columns a record does not carry are `Scalar::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl FlatBatch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Flatten one record into `(column, value)` pairs in key order.
pub fn flatten_record(record: &RawRecord) -> Vec<(String, Scalar)> {
    let mut out = Vec::with_capacity(record.len());
    flatten_into(None, record, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, object: &Map<String, Value>, out: &mut Vec<(String, Scalar)>) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(Some(&path), nested, out),
            other => out.push((path.to_uppercase(), scalar_from(other))),
        }
    }
}

fn scalar_from(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Integer(i)
            } else {
                Scalar::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Scalar::Text(s.clone()),
        // Arrays have no tabular shape; keep the raw JSON text.
        Value::Array(_) => Scalar::Text(value.to_string()),
        Value::Object(_) => unreachable!("objects are flattened before this point"),
    }
}

/// Flatten a record sequence into one aligned batch.
///
/// The column list is the union of all record columns in first-seen order;
/// rows missing a column are padded with `Null`.
pub fn flatten_records(records: &[RawRecord]) -> FlatBatch {
    let mut columns: Vec<String> = Vec::new();
    let mut flat_rows = Vec::with_capacity(records.len());

    for record in records {
        let flat = flatten_record(record);
        for (name, _) in &flat {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.clone());
            }
        }
        flat_rows.push(flat);
    }

    let rows = flat_rows
        .into_iter()
        .map(|flat| {
            let mut row = vec![Scalar::Null; columns.len()];
            for (name, value) in flat {
                if let Some(idx) = columns.iter().position(|c| c == &name) {
                    row[idx] = value;
                }
            }
            row
        })
        .collect();

    FlatBatch { columns, rows }
}
