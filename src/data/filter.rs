use super::IndicatorTable;
use std::collections::HashSet;
use tracing::debug;

/// Countries left out of the donor pool and the treated unit alike.
pub const DEFAULT_EXCLUDED_COUNTRIES: [&str; 6] = [
    "Estonia",
    "Slovenia",
    "Latvia",
    "Lithuania",
    "Luxemburg",
    "Belgium",
];

pub fn default_excluded_countries() -> Vec<String> {
    DEFAULT_EXCLUDED_COUNTRIES.map(String::from).to_vec()
}

/// Returns a copy of `table` without the rows whose country is excluded.
/// Excluded names that do not occur in the table are ignored.
pub fn exclude_countries(table: &IndicatorTable, excluded: &[String]) -> IndicatorTable {
    let excluded: HashSet<&str> = excluded.iter().map(|c| c.trim()).collect();

    let rows: Vec<_> = table
        .rows
        .iter()
        .filter(|row| !excluded.contains(row.country.trim()))
        .cloned()
        .collect();

    debug!(
        indicator = %table.indicator,
        removed = table.rows.len() - rows.len(),
        "excluded countries"
    );

    IndicatorTable {
        indicator: table.indicator,
        years: table.years.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CountryRow;
    use crate::types::Indicator;

    fn table(countries: &[&str]) -> IndicatorTable {
        IndicatorTable {
            indicator: Indicator::Inflation,
            years: vec![2000],
            rows: countries
                .iter()
                .map(|c| CountryRow {
                    country: c.to_string(),
                    values: vec![Some(1.0)],
                })
                .collect(),
        }
    }

    #[test]
    fn test_exclusion_is_exact() {
        let filtered = exclude_countries(
            &table(&["Germany", "Belgium", "Latvia", "Latvian Republic", "France"]),
            &default_excluded_countries(),
        );
        assert_eq!(filtered.countries(), vec!["Germany", "Latvian Republic", "France"]);
    }

    #[test]
    fn test_absent_excluded_countries_are_ignored() {
        let original = table(&["Germany", "Austria"]);
        let filtered = exclude_countries(&original, &default_excluded_countries());
        assert_eq!(filtered, original);
    }
}
