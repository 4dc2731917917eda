//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds query specifications
//! - runs the fetch/load pipeline
//! - prints report tables

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FetchArgs, LoadArgs, QueryArgs, ReportArgs, ReportKind};
use crate::data::worldbank::DEFAULT_BASE_URL;
use crate::domain::{CountryFilter, DateSelector, QuerySpec};
use crate::error::AppError;
use crate::report;
use crate::store::Store;

pub mod pipeline;

/// Entry point for the `wdb` binary.
pub fn run() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Fetch(args) => handle_fetch(args),
        Command::Load(args) => handle_load(args),
        Command::Report(args) => handle_report(args),
    }
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let base_url = resolve_base_url(args.query.base_url.clone());
    let spec = query_spec_from_args(&args.series, &args.query)?;

    let records = pipeline::fetch_records(&spec, &base_url)?;
    let json = Value::Array(records.into_iter().map(Value::Object).collect());
    println!("{json:#}");
    Ok(())
}

fn handle_load(args: LoadArgs) -> Result<(), AppError> {
    let base_url = resolve_base_url(args.query.base_url.clone());
    let mut store = Store::open(&args.db)?;

    // Series are loaded sequentially into the same table, one full
    // fetch-and-append per series.
    for series in &args.series {
        let spec = query_spec_from_args(series, &args.query)?;
        let output = pipeline::run_load(&spec, &base_url, &mut store, &args.table)?;
        println!(
            "{}: fetched {} records, appended {} rows to '{}'",
            output.series, output.fetched, output.appended, args.table
        );
    }
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<(), AppError> {
    let store = Store::open(&args.db)?;
    let table = args.table.as_str();

    let output = match args.kind {
        ReportKind::Growth => {
            report::format_growth_table(&report::population_growth(&store, table)?)
        }
        ReportKind::Vitals => {
            let min_year = args.min_year.unwrap_or(report::DEFAULT_VITALS_MIN_YEAR);
            report::format_vitals_table(&report::vital_rates(&store, table, min_year)?)
        }
        ReportKind::Deaths => {
            let min_year = args.min_year.unwrap_or(report::DEFAULT_DEATHS_MIN_YEAR);
            report::format_deaths_table(&report::absolute_deaths(&store, table, min_year)?)
        }
    };

    println!("{output}");
    Ok(())
}

/// Build a [`QuerySpec`] from the shared CLI query options.
pub fn query_spec_from_args(series: &str, query: &QueryArgs) -> Result<QuerySpec, AppError> {
    let dates = DateSelector::new(query.start.clone(), query.end.clone())?;
    let countries = CountryFilter::parse(&query.country)?;
    QuerySpec::new(series, dates, countries)
}

/// Base URL resolution order: explicit flag, then `WDB_BASE_URL` (a `.env`
/// file is honored), then the production endpoint.
fn resolve_base_url(flag: Option<String>) -> String {
    if let Some(url) = flag {
        return url;
    }
    dotenvy::dotenv().ok();
    std::env::var("WDB_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}
