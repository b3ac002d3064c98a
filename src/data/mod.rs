pub mod filter;
pub mod interpolate;
pub mod loader;
pub mod panel;
pub mod reshape;

use crate::types::Indicator;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Wide indicator table: one row per country, one column per year.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    pub indicator: Indicator,
    pub years: Vec<i32>,
    pub rows: Vec<CountryRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryRow {
    pub country: String,
    pub values: Vec<Option<f64>>, // Aligned with `IndicatorTable::years`
}

impl IndicatorTable {
    pub fn countries(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.country.as_str()).collect()
    }

    pub fn value(&self, country: &str, year: i32) -> Option<f64> {
        let col = self.years.iter().position(|&y| y == year)?;
        self.rows
            .iter()
            .find(|row| row.country == country)
            .and_then(|row| row.values.get(col).copied().flatten())
    }
}

/// A single (country, year) cell of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub country: String,
    pub year: i32,
    pub indicator: Indicator,
    pub value: Option<f64>,
}

/// Long-format table of observations for one indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub indicator: Indicator,
    pub observations: Vec<Observation>,
}

/// The five indicator tables as read from a workbook.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub tables: HashMap<Indicator, IndicatorTable>,
}

impl Workbook {
    pub fn table(&self, indicator: Indicator) -> Result<&IndicatorTable> {
        self.tables
            .get(&indicator)
            .ok_or_else(|| DataError::MissingSheet(indicator.sheet_name().to_string()))
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing sheet: {0}")]
    MissingSheet(String),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Invalid year header {header:?} in sheet {sheet}")]
    InvalidYear { sheet: String, header: String },
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}

pub type Result<T> = std::result::Result<T, DataError>;

/// Runs the cleaning stages on a loaded workbook: exclusion, reshape, common
/// years, merge and interpolation.
pub fn prepare_panel(workbook: &Workbook, excluded: &[String]) -> Result<panel::Panel> {
    let mut long_tables = Vec::with_capacity(Indicator::ALL.len());
    for indicator in Indicator::ALL {
        let table = filter::exclude_countries(workbook.table(indicator)?, excluded);
        long_tables.push(reshape::to_long(&table));
    }

    let years = panel::common_years(&long_tables);
    info!(
        years = years.len(),
        first = ?years.first(),
        last = ?years.last(),
        "common years across indicators"
    );
    let restricted: Vec<LongTable> = long_tables
        .into_iter()
        .map(|table| panel::restrict_years(table, &years))
        .collect();

    let (seed, others) = restricted
        .split_first()
        .ok_or_else(|| DataError::MissingSheet(Indicator::Inflation.sheet_name().to_string()))?;
    let merged = panel::merge(seed, others);
    info!(rows = merged.rows.len(), "merged panel");

    Ok(interpolate::interpolate(merged))
}
