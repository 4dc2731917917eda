//! Shared fetch -> flatten -> load pipeline.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! paged fetch -> drain -> flatten -> append
//!
//! The CLI front-end then focuses on presentation (printing summaries and
//! report tables).

use tracing::info;

use crate::data::worldbank::{RawRecord, WorldBankConnector};
use crate::domain::QuerySpec;
use crate::error::AppError;
use crate::io::flatten::flatten_records;
use crate::store::Store;

/// Outcome of loading one series.
#[derive(Debug, Clone)]
pub struct LoadOutput {
    pub series: String,
    pub fetched: usize,
    pub appended: usize,
}

/// Drain every page of `spec` from the API, in page order.
pub fn fetch_records(spec: &QuerySpec, base_url: &str) -> Result<Vec<RawRecord>, AppError> {
    let mut connector = WorldBankConnector::with_base_url(spec.clone(), base_url)?;
    connector.fetch_all()
}

/// Flatten `records` and append them to `table`.
pub fn load_records(
    records: &[RawRecord],
    store: &mut Store,
    table: &str,
) -> Result<usize, AppError> {
    let batch = flatten_records(records);
    store.append_batch(table, &batch)
}

/// Fetch one series and append it to `table`. The whole fetch completes
/// before anything is written; a fetch error therefore commits nothing.
pub fn run_load(
    spec: &QuerySpec,
    base_url: &str,
    store: &mut Store,
    table: &str,
) -> Result<LoadOutput, AppError> {
    let records = fetch_records(spec, base_url)?;
    info!(series = %spec.series, records = records.len(), "fetched series");

    let appended = load_records(&records, store, table)?;
    Ok(LoadOutput {
        series: spec.series.clone(),
        fetched: records.len(),
        appended,
    })
}
