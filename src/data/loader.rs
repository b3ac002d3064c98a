use super::{CountryRow, DataError, IndicatorTable, Result, Workbook};
use crate::types::Indicator;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Reads the five indicator sheets from a spreadsheet or from a directory of
/// per-sheet CSV exports (`Inflation.csv`, `Public Debt.csv`, ...).
pub struct WorkbookLoader;

impl WorkbookLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        if path.is_dir() {
            return Self::load_csv_dir(path);
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();
        if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
            Self::load_spreadsheet(path)
        } else {
            Err(DataError::UnsupportedInput(path.display().to_string()))
        }
    }

    pub fn load_spreadsheet<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading workbook");
        let mut workbook = open_workbook_auto(path)?;
        let sheet_names = workbook.sheet_names();

        let mut tables = HashMap::new();
        for indicator in Indicator::ALL {
            let name = indicator.sheet_name();
            let sheet = sheet_names
                .iter()
                .find(|sheet| sheet.trim() == name)
                .ok_or_else(|| DataError::MissingSheet(name.to_string()))?;
            let range = workbook.worksheet_range(sheet)?;

            let mut rows = range.rows();
            let header: Vec<String> = rows
                .next()
                .ok_or_else(|| DataError::MissingColumn(format!("{name}: header row")))?
                .iter()
                .map(|cell| cell.to_string())
                .collect();
            let body = rows.map(|cells| {
                let country = cells.first().map(|c| c.to_string()).unwrap_or_default();
                let values = cells.iter().skip(1).map(spreadsheet_cell_value).collect();
                (country, values)
            });

            let table = Self::build_table(indicator, &header, body)?;
            debug!(sheet = name, rows = table.rows.len(), "sheet loaded");
            tables.insert(indicator, table);
        }

        Ok(Workbook { tables })
    }

    pub fn load_csv_dir<P: AsRef<Path>>(dir: P) -> Result<Workbook> {
        let dir = dir.as_ref();
        info!(path = %dir.display(), "loading CSV workbook directory");

        let mut tables = HashMap::new();
        for indicator in Indicator::ALL {
            let name = indicator.sheet_name();
            let file = dir.join(format!("{name}.csv"));
            if !file.is_file() {
                return Err(DataError::MissingSheet(name.to_string()));
            }

            let mut rdr = ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_path(&file)?;
            let header: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();

            let mut body = Vec::new();
            for record in rdr.records() {
                let record = record?;
                let country = record.get(0).unwrap_or_default().to_string();
                let values = record.iter().skip(1).map(parse_cell).collect();
                body.push((country, values));
            }

            let table = Self::build_table(indicator, &header, body)?;
            debug!(sheet = name, rows = table.rows.len(), "sheet loaded");
            tables.insert(indicator, table);
        }

        Ok(Workbook { tables })
    }

    /// Turns a header row and raw body rows into an `IndicatorTable`.
    ///
    /// The first header cell names the country column; every other non-blank
    /// header must be a year. Columns under a blank header and rows without a
    /// country label are dropped.
    pub fn build_table<I>(indicator: Indicator, header: &[String], body: I) -> Result<IndicatorTable>
    where
        I: IntoIterator<Item = (String, Vec<Option<f64>>)>,
    {
        let sheet = indicator.sheet_name();
        if header.is_empty() {
            return Err(DataError::MissingColumn(format!("{sheet}: country")));
        }

        let mut year_columns = Vec::new();
        for (idx, label) in header.iter().enumerate().skip(1) {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            let year = parse_year(label).ok_or_else(|| DataError::InvalidYear {
                sheet: sheet.to_string(),
                header: label.to_string(),
            })?;
            // Body values exclude the country column.
            year_columns.push((idx - 1, year));
        }
        if year_columns.is_empty() {
            return Err(DataError::MissingColumn(format!("{sheet}: year columns")));
        }

        let rows = body
            .into_iter()
            .filter_map(|(country, values)| {
                let country = country.trim().to_string();
                if country.is_empty() {
                    return None;
                }
                let values = year_columns
                    .iter()
                    .map(|&(col, _)| values.get(col).copied().flatten())
                    .collect();
                Some(CountryRow { country, values })
            })
            .collect();

        Ok(IndicatorTable {
            indicator,
            years: year_columns.into_iter().map(|(_, year)| year).collect(),
            rows,
        })
    }
}

/// Parses a year header such as `1999` or `1999.0`.
fn parse_year(label: &str) -> Option<i32> {
    if let Ok(year) = label.parse::<i32>() {
        return Some(year);
    }
    let value = label.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value.abs() < i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Blank and non-numeric cells are absent values. Commas are read as
/// thousands separators when they group digits in threes (`12,345.6`),
/// otherwise a single comma without a '.' is a decimal comma (`1,5`).
fn parse_cell(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let normalized = if !raw.contains(',') {
        raw.to_string()
    } else if is_thousands_grouped(raw) {
        raw.replace(',', "")
    } else if raw.matches(',').count() == 1 && !raw.contains('.') {
        raw.replace(',', ".")
    } else {
        debug!(cell = raw, "ambiguous comma in numeric cell; treated as absent");
        return None;
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `[-+]d{1,3}(,ddd)+[.d*]` with a non-zero leading group.
fn is_thousands_grouped(raw: &str) -> bool {
    let unsigned = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    let integer = unsigned.split('.').next().unwrap_or_default();
    if unsigned.matches('.').count() > 1 {
        return false;
    }

    let mut groups = integer.split(',');
    let Some(lead) = groups.next() else {
        return false;
    };
    let lead_ok = (1..=3).contains(&lead.len())
        && lead.bytes().all(|b| b.is_ascii_digit())
        && !lead.starts_with('0');
    let mut rest = groups.peekable();
    lead_ok
        && rest.peek().is_some()
        && rest.all(|group| group.len() == 3 && group.bytes().all(|b| b.is_ascii_digit()))
}

fn spreadsheet_cell_value(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(value) if value.is_finite() => Some(*value),
        Data::Int(value) => Some(*value as f64),
        Data::String(raw) => parse_cell(raw),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_year_accepts_float_headers() {
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("2001.0"), Some(2001));
        assert_eq!(parse_year("2001.5"), None);
        assert_eq!(parse_year("GDP"), None);
    }

    #[test]
    fn test_parse_cell_marks_blank_and_text_absent() {
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell(" : "), None);
        assert_eq!(parse_cell("n/a"), None);
        assert_eq!(parse_cell("1,5"), Some(1.5));
        assert_eq!(parse_cell("-0.25"), Some(-0.25));
    }

    #[test]
    fn test_parse_cell_reads_thousands_separators() {
        assert_eq!(parse_cell("1,000"), Some(1000.0));
        assert_eq!(parse_cell("12,345.6"), Some(12345.6));
        assert_eq!(parse_cell("-1,234,567"), Some(-1234567.0));
        assert_eq!(parse_cell("1,5"), Some(1.5));
        assert_eq!(parse_cell("0,125"), Some(0.125));
        assert_eq!(parse_cell("1,2,3"), None);
        assert_eq!(parse_cell("1,23.4"), None);
    }

    #[test]
    fn test_spreadsheet_cells_map_to_values() {
        assert_eq!(spreadsheet_cell_value(&Data::Float(2.5)), Some(2.5));
        assert_eq!(spreadsheet_cell_value(&Data::Int(7)), Some(7.0));
        assert_eq!(spreadsheet_cell_value(&Data::String("3,5".to_string())), Some(3.5));
        assert_eq!(spreadsheet_cell_value(&Data::String("n/a".to_string())), None);
        assert_eq!(spreadsheet_cell_value(&Data::Float(f64::NAN)), None);
        assert_eq!(spreadsheet_cell_value(&Data::Bool(true)), None);
        assert_eq!(spreadsheet_cell_value(&Data::Empty), None);
    }

    #[test]
    fn test_build_table_rejects_non_year_header() {
        let header = vec!["Country".to_string(), "1999".to_string(), "Notes".to_string()];
        let err = WorkbookLoader::build_table(Indicator::Deficit, &header, Vec::new()).unwrap_err();
        assert!(matches!(err, DataError::InvalidYear { .. }));
    }

    #[test]
    fn test_build_table_skips_blank_rows_and_columns() {
        let header = vec![
            "Country".to_string(),
            "2000".to_string(),
            "".to_string(),
            "2001".to_string(),
        ];
        let body = vec![
            ("Germany".to_string(), vec![Some(1.0), Some(9.9), Some(2.0)]),
            ("  ".to_string(), vec![Some(5.0), None, None]),
            ("France".to_string(), vec![None]),
        ];
        let table = WorkbookLoader::build_table(Indicator::Imports, &header, body).unwrap();

        assert_eq!(table.years, vec![2000, 2001]);
        assert_eq!(table.countries(), vec!["Germany", "France"]);
        assert_eq!(table.rows[0].values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(table.rows[1].values, vec![None, None]);
    }

    #[test]
    fn test_missing_csv_sheet_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Inflation.csv"), "Country,2000\nGermany,1.0\n").unwrap();

        let err = WorkbookLoader::load(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::MissingSheet(ref sheet) if sheet == "Imports"));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = WorkbookLoader::load("indicators.txt").unwrap_err();
        assert!(matches!(err, DataError::UnsupportedInput(_)));
    }
}
