use approx::assert_relative_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use synth_panel::{
    analysis::{
        self,
        dataprep::{DataprepError, PredictorSpec, ScmSpec},
        report::SynthReport,
        synth::NestedSimplexSolver,
        AnalysisError,
    },
    data::{self, filter::default_excluded_countries, loader::WorkbookLoader, panel::Panel},
    types::{Indicator, Reduction, YearRange},
};
use tempfile::TempDir;

/// Country parameters: every indicator is affine in (a, b), and Germany sits
/// halfway between Austria and France.
const COUNTRIES: [(&str, f64, f64); 5] = [
    ("Austria", 1.0, 0.5),
    ("France", 3.0, 1.5),
    ("Germany", 2.0, 1.0),
    ("Italy", 10.0, 0.2),
    ("Belgium", 4.0, 0.9),
];

fn value(indicator: Indicator, country: &str, a: f64, b: f64, year: i32) -> Option<f64> {
    let t = (year - 2000) as f64;
    let v = match indicator {
        Indicator::Inflation => a + b * t,
        Indicator::Imports => 20.0 + 5.0 * b - a,
        Indicator::PublicDebt => 60.0 + a + b * t,
        Indicator::Deficit => {
            let treatment = if country == "Germany" && year >= 2004 { 3.0 } else { 0.0 };
            0.5 * a + b * t + treatment
        }
        Indicator::Expenditure => 40.0 + b - 0.2 * a * t,
    };

    let blank = matches!(
        (indicator, country, year),
        (Indicator::Imports, "Austria", 2002)
            | (Indicator::Expenditure, "France", 2000)
            | (Indicator::PublicDebt, "Italy", _)
    );
    (!blank).then_some(v)
}

fn years_for(indicator: Indicator) -> Vec<i32> {
    match indicator {
        Indicator::Inflation => (1999..=2005).collect(),
        Indicator::Imports => (2000..=2006).collect(),
        _ => (2000..=2005).collect(),
    }
}

fn write_workbook(dir: &Path) {
    for indicator in Indicator::ALL {
        let years = years_for(indicator);
        let mut contents = String::from("Country");
        for year in &years {
            contents.push_str(&format!(",{year}"));
        }
        contents.push('\n');

        let mut countries: Vec<(&str, f64, f64)> = COUNTRIES.to_vec();
        if indicator == Indicator::Imports {
            countries.push(("Spain", 5.0, 1.0));
        }
        for (country, a, b) in countries {
            contents.push_str(country);
            for &year in &years {
                contents.push(',');
                if let Some(v) = value(indicator, country, a, b, year) {
                    contents.push_str(&v.to_string());
                }
            }
            contents.push('\n');
        }
        fs::write(dir.join(format!("{}.csv", indicator.sheet_name())), contents).unwrap();
    }
}

fn prepared_panel() -> (TempDir, Panel) {
    let dir = tempfile::tempdir().unwrap();
    write_workbook(dir.path());
    let workbook = WorkbookLoader::load(dir.path()).expect("workbook loads");
    let panel = data::prepare_panel(&workbook, &default_excluded_countries()).expect("panel");
    (dir, panel)
}

fn spec(outcome: Indicator) -> ScmSpec {
    let pre = YearRange::new(2000, 2003);
    ScmSpec {
        treated: "Germany".to_string(),
        outcome,
        treatment_year: 2004,
        predictors: vec![
            PredictorSpec {
                indicator: Indicator::Inflation,
                years: pre,
                reduction: Reduction::Mean,
            },
            PredictorSpec {
                indicator: Indicator::Imports,
                years: pre,
                reduction: Reduction::Mean,
            },
        ],
        pre_treatment: pre,
        optimization: pre,
        plot: YearRange::new(2000, 2005),
    }
}

#[test]
fn test_panel_keeps_only_common_years() {
    let (_dir, panel) = prepared_panel();
    assert_eq!(panel.years(), (2000..=2005).collect::<BTreeSet<_>>());
}

#[test]
fn test_panel_excludes_countries_and_unseeded_rows() {
    let (_dir, panel) = prepared_panel();
    let countries: Vec<_> = panel.countries().into_iter().collect();
    assert_eq!(countries, vec!["Austria", "France", "Germany", "Italy"]);
    for excluded in default_excluded_countries() {
        assert!(panel.rows.iter().all(|row| row.country != excluded));
    }
    assert_eq!(panel.rows.len(), 4 * 6);
}

#[test]
fn test_blank_cells_are_interpolated() {
    let (_dir, panel) = prepared_panel();

    assert_relative_eq!(
        panel.value("Austria", 2002, Indicator::Imports).unwrap(),
        21.5,
        epsilon = 1e-12
    );
    // Boundary gap holds the 2001 value.
    assert_relative_eq!(
        panel.value("France", 2000, Indicator::Expenditure).unwrap(),
        panel.value("France", 2001, Indicator::Expenditure).unwrap()
    );
    assert!(panel
        .country_rows("Italy")
        .all(|row| row.public_debt.is_none()));
    for row in panel.rows.iter().filter(|row| row.country != "Italy") {
        for indicator in Indicator::ALL {
            assert!(row.get(indicator).is_some(), "{} {} {indicator}", row.country, row.year);
        }
    }
}

#[test]
fn test_synthetic_germany_matches_midpoint_of_donors() {
    let (_dir, panel) = prepared_panel();
    let result = analysis::estimate(&panel, &spec(Indicator::Deficit), &NestedSimplexSolver::default())
        .expect("estimation succeeds");

    let treated = result.units.id("Germany").unwrap();
    assert_eq!(result.input.treated_id, treated);
    assert_eq!(result.input.control_ids.len(), 3);
    assert!(!result.input.control_ids.contains(&treated));

    let weights = result.control_weights();
    assert_relative_eq!(
        weights.iter().map(|(_, _, w)| w).sum::<f64>(),
        1.0,
        epsilon = 1e-9
    );
    let weight_of = |name: &str| weights.iter().find(|(_, n, _)| *n == name).unwrap().2;
    assert_relative_eq!(weight_of("Austria"), 0.5, epsilon = 1e-4);
    assert_relative_eq!(weight_of("France"), 0.5, epsilon = 1e-4);
    assert_relative_eq!(weight_of("Italy"), 0.0, epsilon = 1e-4);

    let report = SynthReport::from_result(&result);
    assert!(report.fit.pre_rmspe < 1e-3);
    for point in report.path.iter().filter(|p| p.post_treatment) {
        assert_relative_eq!(point.gap, 3.0, epsilon = 1e-3);
    }
}

#[test]
fn test_consumed_series_without_data_is_fatal() {
    let (_dir, panel) = prepared_panel();
    let err = analysis::estimate(&panel, &spec(Indicator::PublicDebt), &NestedSimplexSolver::default())
        .unwrap_err();

    match err {
        AnalysisError::Dataprep(DataprepError::MissingValue {
            country, indicator, ..
        }) => {
            assert_eq!(country, "Italy");
            assert_eq!(indicator, Indicator::PublicDebt);
        }
        other => panic!("unexpected error: {other}"),
    }
}
