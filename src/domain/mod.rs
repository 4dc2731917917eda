//! Shared domain types for indicator queries.
//!
//! A [`QuerySpec`] captures everything needed to address one indicator
//! series: the series id, the date selection, and the country filter. It is
//! immutable once built; the only mutable request state (the page counter)
//! lives in `data::worldbank::PageCursor`.

use std::fmt;

use crate::error::AppError;

/// Date selection for a query: a single period or an inclusive range.
///
/// Tokens are opaque (`2000`, `2000M07`, ...); the API decides whether a
/// token is valid for the series being queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelector {
    Single(String),
    Range(String, String),
}

impl DateSelector {
    pub fn new(start: impl Into<String>, end: Option<String>) -> Result<Self, AppError> {
        let start = start.into();
        if start.trim().is_empty() {
            return Err(AppError::Query("start date must not be empty".into()));
        }
        match end {
            Some(end) if end.trim().is_empty() => {
                Err(AppError::Query("end date must not be empty".into()))
            }
            Some(end) => Ok(DateSelector::Range(start, end)),
            None => Ok(DateSelector::Single(start)),
        }
    }

    /// The `date` query parameter: `start` alone, or `start:end`.
    pub fn param(&self) -> String {
        match self {
            DateSelector::Single(start) => start.clone(),
            DateSelector::Range(start, end) => format!("{start}:{end}"),
        }
    }
}

/// Country selection: everything, or a set of iso2 codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryFilter {
    All,
    Codes(Vec<String>),
}

impl CountryFilter {
    /// Parse the CLI form: `all`, or codes separated by `;` (`ca;us;mx`).
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(CountryFilter::All);
        }
        let codes: Vec<String> = raw
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if codes.is_empty() {
            return Err(AppError::Query(format!("invalid country filter: '{raw}'")));
        }
        Ok(CountryFilter::Codes(codes))
    }
}

impl fmt::Display for CountryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountryFilter::All => f.write_str("all"),
            CountryFilter::Codes(codes) => f.write_str(&codes.join(";")),
        }
    }
}

impl Default for CountryFilter {
    fn default() -> Self {
        CountryFilter::All
    }
}

/// One indicator query: which series, which dates, which countries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub series: String,
    pub dates: DateSelector,
    pub countries: CountryFilter,
}

impl QuerySpec {
    pub fn new(
        series: impl Into<String>,
        dates: DateSelector,
        countries: CountryFilter,
    ) -> Result<Self, AppError> {
        let series = series.into();
        if series.trim().is_empty() {
            return Err(AppError::Query("series id must not be empty".into()));
        }
        Ok(Self {
            series,
            dates,
            countries,
        })
    }

    /// Target URL for this query: `{base}/country/{country}/indicator/{series}`.
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        format!("{base}/country/{}/indicator/{}", self.countries, self.series)
    }
}
