use super::{LongTable, Observation};
use crate::types::Indicator;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// One (country, year) row of the merged panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub country: String,
    pub year: i32,
    pub inflation: Option<f64>,
    pub imports: Option<f64>,
    pub public_debt: Option<f64>,
    pub deficit: Option<f64>,
    pub expenditure: Option<f64>,
}

impl PanelRow {
    pub fn new(country: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            year,
            inflation: None,
            imports: None,
            public_debt: None,
            deficit: None,
            expenditure: None,
        }
    }

    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        match indicator {
            Indicator::Inflation => self.inflation,
            Indicator::Imports => self.imports,
            Indicator::PublicDebt => self.public_debt,
            Indicator::Deficit => self.deficit,
            Indicator::Expenditure => self.expenditure,
        }
    }

    pub fn set(&mut self, indicator: Indicator, value: Option<f64>) {
        let slot = match indicator {
            Indicator::Inflation => &mut self.inflation,
            Indicator::Imports => &mut self.imports,
            Indicator::PublicDebt => &mut self.public_debt,
            Indicator::Deficit => &mut self.deficit,
            Indicator::Expenditure => &mut self.expenditure,
        };
        *slot = value;
    }
}

/// Merged panel, sorted by (country, year).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Panel {
    pub rows: Vec<PanelRow>,
}

impl Panel {
    pub fn new(mut rows: Vec<PanelRow>) -> Self {
        rows.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn countries(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|row| row.country.as_str()).collect()
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.rows.iter().map(|row| row.year).collect()
    }

    pub fn value(&self, country: &str, year: i32, indicator: Indicator) -> Option<f64> {
        self.row(country, year).and_then(|row| row.get(indicator))
    }

    pub fn row(&self, country: &str, year: i32) -> Option<&PanelRow> {
        self.rows
            .binary_search_by(|row| row.country.as_str().cmp(country).then(row.year.cmp(&year)))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    /// Rows of one country in year order.
    pub fn country_rows<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a PanelRow> + 'a {
        self.rows.iter().filter(move |row| row.country == country)
    }
}

/// Years present in every table. An empty input or a disjoint set of tables
/// yields an empty set.
pub fn common_years(tables: &[LongTable]) -> BTreeSet<i32> {
    let mut iter = tables.iter().map(|table| {
        table
            .observations
            .iter()
            .map(|obs| obs.year)
            .collect::<BTreeSet<_>>()
    });

    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };
    let common = iter.fold(first, |acc, years| acc.intersection(&years).copied().collect());
    if common.is_empty() {
        warn!("indicator tables share no common year; panel will be empty");
    }
    common
}

pub fn restrict_years(table: LongTable, years: &BTreeSet<i32>) -> LongTable {
    LongTable {
        indicator: table.indicator,
        observations: table
            .observations
            .into_iter()
            .filter(|obs| years.contains(&obs.year))
            .collect(),
    }
}

/// Left-joins `others` onto `seed` by (country, year). The result has exactly
/// one row per distinct seed key; values missing from a joined table stay
/// absent.
pub fn merge(seed: &LongTable, others: &[LongTable]) -> Panel {
    let seed_countries: HashSet<&str> = seed
        .observations
        .iter()
        .map(|obs| obs.country.as_str())
        .collect();

    let lookups: Vec<(Indicator, HashMap<(&str, i32), Option<f64>>)> = others
        .iter()
        .map(|table| (table.indicator, index_observations(table)))
        .collect();

    for (table, (indicator, lookup)) in others.iter().zip(&lookups) {
        let countries: HashSet<&str> = lookup.keys().map(|(country, _)| *country).collect();
        for country in countries.difference(&seed_countries) {
            warn!(%country, %indicator, seed = %seed.indicator, "country missing from seed table; dropped at merge");
        }
        for country in seed_countries.difference(&countries) {
            warn!(%country, indicator = %table.indicator, "country missing from joined table; values left absent");
        }
    }

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(seed.observations.len());
    for obs in &seed.observations {
        if !seen.insert((obs.country.as_str(), obs.year)) {
            warn!(country = %obs.country, year = obs.year, "duplicate key in seed table; keeping first");
            continue;
        }
        let mut row = PanelRow::new(obs.country.clone(), obs.year);
        row.set(seed.indicator, obs.value);
        for (indicator, lookup) in &lookups {
            let value = lookup
                .get(&(obs.country.as_str(), obs.year))
                .copied()
                .flatten();
            row.set(*indicator, value);
        }
        rows.push(row);
    }

    Panel::new(rows)
}

fn index_observations(table: &LongTable) -> HashMap<(&str, i32), Option<f64>> {
    let mut index = HashMap::with_capacity(table.observations.len());
    for Observation {
        country,
        year,
        value,
        ..
    } in &table.observations
    {
        if index.contains_key(&(country.as_str(), *year)) {
            warn!(%country, year, indicator = %table.indicator, "duplicate key; keeping first");
            continue;
        }
        index.insert((country.as_str(), *year), *value);
    }
    index
}
