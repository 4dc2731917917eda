//! Read-only aggregation queries over a loaded indicator table.
//!
//! These are the aggregations the downstream dashboards consume: per-country
//! population growth (window function over the time series), growth joined
//! with birth and death rates across three indicator subsets, and absolute
//! deaths derived from death rate and population. Everything here depends
//! only on the loaded column identities (`COUNTRY_ID`, `DATE`, `VALUE`,
//! `INDICATOR_ID`) and never writes.

pub mod format;

pub use format::*;

use rusqlite::Connection;

use crate::error::AppError;
use crate::store::{Store, quote_ident, validate_table_name};

/// Yearly total population.
pub const POPULATION_SERIES: &str = "SP.POP.TOTL";
/// Crude birth rate per 1000 people.
pub const BIRTH_RATE_SERIES: &str = "SP.DYN.CBRT.IN";
/// Crude death rate per 1000 people.
pub const DEATH_RATE_SERIES: &str = "SP.DYN.CDRT.IN";

/// Year cutoff used by the vital-rates report unless overridden.
pub const DEFAULT_VITALS_MIN_YEAR: i64 = 2012;
/// Year cutoff used by the absolute-deaths report unless overridden.
pub const DEFAULT_DEATHS_MIN_YEAR: i64 = 2017;

/// Per-country, per-year population growth.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRow {
    pub country: String,
    pub year: String,
    pub population: f64,
    pub growth: f64,
    pub growth_per_1000: f64,
}

/// Population growth joined with birth and death rates.
///
/// The joins are LEFT JOINs: a country/year can have growth without a
/// matching birth- or death-rate observation.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsRow {
    pub country: String,
    pub year: String,
    pub population: f64,
    pub growth: f64,
    pub births_per_1000: Option<f64>,
    pub deaths_per_1000: Option<f64>,
}

/// Absolute deaths estimated from death rate and population.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathsRow {
    pub country: String,
    pub year: String,
    pub deaths: f64,
}

/// Per-country population growth over the whole loaded range.
///
/// The first year of each country has no predecessor and is excluded.
pub fn population_growth(store: &Store, table: &str) -> Result<Vec<GrowthRow>, AppError> {
    validate_table_name(table)?;
    let table = quote_ident(table);
    let sql = format!(
        "WITH pop AS (
            SELECT
                COUNTRY_ID,
                DATE AS YEAR,
                VALUE AS POP,
                VALUE / 1000.0 AS POP_DIV_1000,
                VALUE - LAG(VALUE)
                    OVER (PARTITION BY COUNTRY_ID ORDER BY DATE)
                    AS POP_GROWTH
            FROM {table}
            WHERE INDICATOR_ID = ?1
        )
        SELECT
            COUNTRY_ID,
            YEAR,
            POP,
            POP_GROWTH,
            POP_GROWTH / POP_DIV_1000 AS POP_GROWTH_PER_1000
        FROM pop
        WHERE POP_GROWTH IS NOT NULL
        ORDER BY COUNTRY_ID, YEAR"
    );

    query_rows(store.connection(), &sql, rusqlite::params![POPULATION_SERIES], |row| {
        Ok(GrowthRow {
            country: row.get(0)?,
            year: row.get(1)?,
            population: row.get(2)?,
            growth: row.get(3)?,
            growth_per_1000: row.get(4)?,
        })
    })
}

/// Population growth joined with birth and death rates, for years strictly
/// after `min_year`.
pub fn vital_rates(store: &Store, table: &str, min_year: i64) -> Result<Vec<VitalsRow>, AppError> {
    validate_table_name(table)?;
    let table = quote_ident(table);
    let sql = format!(
        "WITH growth AS (
            SELECT
                COUNTRY_ID,
                DATE AS YEAR,
                VALUE AS POP,
                VALUE - LAG(VALUE)
                    OVER (PARTITION BY COUNTRY_ID ORDER BY DATE)
                    AS POP_GROWTH
            FROM {table}
            WHERE INDICATOR_ID = ?1
        ),
        births AS (
            SELECT COUNTRY_ID, DATE AS YEAR, VALUE AS BIRTHS_PER_1000
            FROM {table}
            WHERE INDICATOR_ID = ?2
        ),
        deaths AS (
            SELECT COUNTRY_ID, DATE AS YEAR, VALUE AS DEATHS_PER_1000
            FROM {table}
            WHERE INDICATOR_ID = ?3
        )
        SELECT
            growth.COUNTRY_ID,
            growth.YEAR,
            growth.POP,
            growth.POP_GROWTH,
            births.BIRTHS_PER_1000,
            deaths.DEATHS_PER_1000
        FROM growth
        LEFT JOIN births
            ON growth.COUNTRY_ID = births.COUNTRY_ID AND growth.YEAR = births.YEAR
        LEFT JOIN deaths
            ON growth.COUNTRY_ID = deaths.COUNTRY_ID AND growth.YEAR = deaths.YEAR
        WHERE growth.POP_GROWTH IS NOT NULL
          AND CAST(growth.YEAR AS INTEGER) > ?4
        ORDER BY growth.COUNTRY_ID, growth.YEAR"
    );

    query_rows(
        store.connection(),
        &sql,
        rusqlite::params![POPULATION_SERIES, BIRTH_RATE_SERIES, DEATH_RATE_SERIES, min_year],
        |row| {
            Ok(VitalsRow {
                country: row.get(0)?,
                year: row.get(1)?,
                population: row.get(2)?,
                growth: row.get(3)?,
                births_per_1000: row.get(4)?,
                deaths_per_1000: row.get(5)?,
            })
        },
    )
}

/// Absolute deaths (`death rate × population / 1000`) for years strictly
/// after `min_year`. Country/years without a death-rate observation are
/// dropped.
pub fn absolute_deaths(store: &Store, table: &str, min_year: i64) -> Result<Vec<DeathsRow>, AppError> {
    validate_table_name(table)?;
    let table = quote_ident(table);
    let sql = format!(
        "WITH pop AS (
            SELECT COUNTRY_ID, DATE AS YEAR, VALUE / 1000.0 AS POP_DIV_1000
            FROM {table}
            WHERE INDICATOR_ID = ?1
        ),
        deaths AS (
            SELECT COUNTRY_ID, DATE AS YEAR, VALUE AS DEATHS_PER_1000
            FROM {table}
            WHERE INDICATOR_ID = ?2
        )
        SELECT
            pop.COUNTRY_ID,
            pop.YEAR,
            deaths.DEATHS_PER_1000 * pop.POP_DIV_1000 AS DEATHS
        FROM pop
        LEFT JOIN deaths
            ON pop.COUNTRY_ID = deaths.COUNTRY_ID AND pop.YEAR = deaths.YEAR
        WHERE CAST(pop.YEAR AS INTEGER) > ?3
          AND deaths.DEATHS_PER_1000 IS NOT NULL
        ORDER BY pop.COUNTRY_ID, pop.YEAR"
    );

    query_rows(
        store.connection(),
        &sql,
        rusqlite::params![POPULATION_SERIES, DEATH_RATE_SERIES, min_year],
        |row| {
            Ok(DeathsRow {
                country: row.get(0)?,
                year: row.get(1)?,
                deaths: row.get(2)?,
            })
        },
    )
}

fn query_rows<T, F>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: F,
) -> Result<Vec<T>, AppError>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AppError::Storage(format!("failed to prepare report query: {e}")))?;
    let rows = stmt
        .query_map(params, map)
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| AppError::Storage(format!("failed to run report query: {e}")))?;
    Ok(rows)
}
