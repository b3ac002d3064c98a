use super::{CountryRow, IndicatorTable, LongTable, Observation};
use std::collections::{BTreeSet, HashMap};

/// Melts a wide table into one observation per (country, year) cell.
pub fn to_long(table: &IndicatorTable) -> LongTable {
    let observations = table
        .rows
        .iter()
        .flat_map(|row| {
            table
                .years
                .iter()
                .zip(row.values.iter())
                .map(move |(&year, &value)| Observation {
                    country: row.country.clone(),
                    year,
                    indicator: table.indicator,
                    value,
                })
        })
        .collect();

    LongTable {
        indicator: table.indicator,
        observations,
    }
}

/// Pivots observations back to wide form. Countries keep their first-seen
/// order and years are ascending; cells with no observation are absent.
pub fn to_wide(long: &LongTable) -> IndicatorTable {
    let years: Vec<i32> = long
        .observations
        .iter()
        .map(|obs| obs.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let year_index: HashMap<i32, usize> = years.iter().enumerate().map(|(i, &y)| (y, i)).collect();

    let mut rows: Vec<CountryRow> = Vec::new();
    let mut row_index: HashMap<&str, usize> = HashMap::new();
    for obs in &long.observations {
        let idx = *row_index.entry(obs.country.as_str()).or_insert_with(|| {
            rows.push(CountryRow {
                country: obs.country.clone(),
                values: vec![None; years.len()],
            });
            rows.len() - 1
        });
        rows[idx].values[year_index[&obs.year]] = obs.value;
    }

    IndicatorTable {
        indicator: long.indicator,
        years,
        rows,
    }
}
