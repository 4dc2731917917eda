//! Plain-text tables for report output.
//!
//! Formatting lives in one place so output changes stay localized. Charts
//! and dashboards are downstream consumers of the table, not of this crate.

use crate::report::{DeathsRow, GrowthRow, VitalsRow};

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Format per-country population growth rows.
pub fn format_growth_table(rows: &[GrowthRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:<6} {:>14} {:>12} {:>20}\n",
        "COUNTRY", "YEAR", "POP", "POP_GROWTH", "POP_GROWTH_PER_1000"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<10} {:<6} {:>14.0} {:>12.0} {:>20.2}\n",
            row.country, row.year, row.population, row.growth, row.growth_per_1000
        ));
    }
    out.push_str(&format!("({} rows)\n", rows.len()));
    out
}

/// Format growth/birth-rate/death-rate rows.
pub fn format_vitals_table(rows: &[VitalsRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:<6} {:>14} {:>12} {:>16} {:>16}\n",
        "COUNTRY", "YEAR", "POP", "POP_GROWTH", "BIRTHS_PER_1000", "DEATHS_PER_1000"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<10} {:<6} {:>14.0} {:>12.0} {:>16} {:>16}\n",
            row.country,
            row.year,
            row.population,
            row.growth,
            opt(row.births_per_1000),
            opt(row.deaths_per_1000)
        ));
    }
    out.push_str(&format!("({} rows)\n", rows.len()));
    out
}

/// Format absolute-deaths rows.
pub fn format_deaths_table(rows: &[DeathsRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<10} {:<6} {:>14}\n", "COUNTRY", "YEAR", "DEATHS"));
    for row in rows {
        out.push_str(&format!(
            "{:<10} {:<6} {:>14.0}\n",
            row.country, row.year, row.deaths
        ));
    }
    out.push_str(&format!("({} rows)\n", rows.len()));
    out
}
