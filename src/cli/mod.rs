//! Command-line parsing for the World Bank indicator loader.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the fetch/load/report code.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "wdb", version, about = "World Bank indicator fetcher and SQLite loader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a series and print the raw records as JSON.
    Fetch(FetchArgs),
    /// Fetch one or more series and append them to a SQLite table.
    Load(LoadArgs),
    /// Run an aggregation report over a previously loaded table.
    Report(ReportArgs),
}

/// Options describing one indicator query.
#[derive(Debug, Parser, Clone)]
pub struct QueryArgs {
    /// Start year or date token (e.g. 2000 or 2000M07).
    #[arg(long)]
    pub start: String,

    /// Optional end token; combined with start as "start:end".
    #[arg(long)]
    pub end: Option<String>,

    /// Country filter: "all", or iso2 codes separated by ';' (e.g. "ca;us;mx").
    #[arg(long, default_value = "all")]
    pub country: String,

    /// Override the API base URL (WDB_BASE_URL in the environment also works).
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Options for `wdb fetch`.
#[derive(Debug, Parser)]
pub struct FetchArgs {
    /// Indicator series id, e.g. SP.POP.TOTL.
    #[arg(short, long)]
    pub series: String,

    #[command(flatten)]
    pub query: QueryArgs,
}

/// Options for `wdb load`.
#[derive(Debug, Parser)]
pub struct LoadArgs {
    /// Indicator series id(s); repeat the flag to load several series.
    #[arg(short, long, required = true)]
    pub series: Vec<String>,

    #[command(flatten)]
    pub query: QueryArgs,

    /// SQLite database file (created if missing).
    #[arg(long)]
    pub db: PathBuf,

    /// Target table name.
    #[arg(long, default_value = "world_data_bank")]
    pub table: String,
}

/// Which report to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Per-country population growth.
    Growth,
    /// Growth joined with birth and death rates.
    Vitals,
    /// Absolute deaths from death rate and population.
    Deaths,
}

/// Options for `wdb report`.
#[derive(Debug, Parser)]
pub struct ReportArgs {
    /// SQLite database file.
    #[arg(long)]
    pub db: PathBuf,

    /// Table to query.
    #[arg(long, default_value = "world_data_bank")]
    pub table: String,

    #[arg(long, value_enum, default_value_t = ReportKind::Growth)]
    pub kind: ReportKind,

    /// Keep only years strictly after this cutoff (vitals/deaths reports).
    #[arg(long)]
    pub min_year: Option<i64>,
}
