use super::units::UnitIndex;
use crate::data::panel::Panel;
use crate::types::{Indicator, Reduction, YearRange};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DataprepError {
    #[error("Treated unit not found in panel: {0}")]
    UnknownTreatedUnit(String),
    #[error("No control units left after removing the treated unit")]
    NoControls,
    #[error("Year {year} of the {window} window is not in the panel")]
    YearOutOfRange { window: &'static str, year: i32 },
    #[error("The {window} window {range} contains no years")]
    EmptyWindow { window: &'static str, range: YearRange },
    #[error("Missing {indicator} for {country} in {year}")]
    MissingValue {
        country: String,
        year: i32,
        indicator: Indicator,
    },
}

pub type Result<T> = std::result::Result<T, DataprepError>;

/// One row of the predictor matrix: an indicator reduced over a year window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSpec {
    pub indicator: Indicator,
    pub years: YearRange,
    pub reduction: Reduction,
}

impl PredictorSpec {
    pub fn label(&self) -> String {
        if self.years.start == self.years.end {
            format!("{} ({})", self.indicator, self.years.start)
        } else {
            format!("{} ({} {})", self.indicator, self.reduction, self.years)
        }
    }
}

/// Everything the estimation needs besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmSpec {
    pub treated: String,
    pub outcome: Indicator,
    pub treatment_year: i32,
    pub predictors: Vec<PredictorSpec>,
    pub pre_treatment: YearRange,
    pub optimization: YearRange,
    pub plot: YearRange,
}

/// Solver input in matrix form. Columns of the `*0` matrices follow
/// `control_ids`.
#[derive(Debug, Clone)]
pub struct ScmInput {
    pub treated_id: usize,
    pub control_ids: Vec<usize>,
    pub predictor_labels: Vec<String>,
    /// Treated predictors (k).
    pub x1: Array1<f64>,
    /// Control predictors (k x J).
    pub x0: Array2<f64>,
    pub optimization_years: Vec<i32>,
    /// Treated outcome over the optimization window.
    pub z1: Array1<f64>,
    /// Control outcomes over the optimization window (T x J).
    pub z0: Array2<f64>,
    pub plot_years: Vec<i32>,
    pub y1: Array1<f64>,
    pub y0: Array2<f64>,
}

pub struct Dataprep;

impl Dataprep {
    /// Builds the predictor and outcome matrices for `spec`. Every value the
    /// estimation reads must be present; the first absent one is an error.
    pub fn build(panel: &Panel, units: &UnitIndex, spec: &ScmSpec) -> Result<ScmInput> {
        let treated_id = units
            .id(&spec.treated)
            .ok_or_else(|| DataprepError::UnknownTreatedUnit(spec.treated.clone()))?;
        let control_ids = units.controls_for(treated_id);
        if control_ids.is_empty() {
            return Err(DataprepError::NoControls);
        }

        let panel_years = panel.years();
        let mut windows: Vec<(&'static str, YearRange)> = vec![
            ("pre-treatment", spec.pre_treatment),
            ("optimization", spec.optimization),
            ("plot", spec.plot),
        ];
        windows.extend(spec.predictors.iter().map(|p| ("predictor", p.years)));
        for (window, range) in windows {
            if range.is_empty() {
                return Err(DataprepError::EmptyWindow { window, range });
            }
            if let Some(year) = range.years().find(|year| !panel_years.contains(year)) {
                return Err(DataprepError::YearOutOfRange { window, year });
            }
        }

        let k = spec.predictors.len();
        let j = control_ids.len();
        let mut x1 = Array1::zeros(k);
        let mut x0 = Array2::zeros((k, j));
        for (row, predictor) in spec.predictors.iter().enumerate() {
            x1[row] = Self::predictor_value(panel, units, treated_id, predictor)?;
            for (col, &id) in control_ids.iter().enumerate() {
                x0[[row, col]] = Self::predictor_value(panel, units, id, predictor)?;
            }
        }

        let (optimization_years, z1, z0) =
            Self::outcome_block(panel, units, treated_id, &control_ids, spec.outcome, spec.optimization)?;
        let (plot_years, y1, y0) =
            Self::outcome_block(panel, units, treated_id, &control_ids, spec.outcome, spec.plot)?;

        debug!(
            treated = treated_id,
            controls = j,
            predictors = k,
            "assembled solver input"
        );

        Ok(ScmInput {
            treated_id,
            control_ids,
            predictor_labels: spec.predictors.iter().map(PredictorSpec::label).collect(),
            x1,
            x0,
            optimization_years,
            z1,
            z0,
            plot_years,
            y1,
            y0,
        })
    }

    fn cell(panel: &Panel, units: &UnitIndex, id: usize, year: i32, indicator: Indicator) -> Result<f64> {
        let country = units.name(id).unwrap_or_default();
        panel
            .value(country, year, indicator)
            .ok_or_else(|| DataprepError::MissingValue {
                country: country.to_string(),
                year,
                indicator,
            })
    }

    fn predictor_value(
        panel: &Panel,
        units: &UnitIndex,
        id: usize,
        predictor: &PredictorSpec,
    ) -> Result<f64> {
        let values = predictor
            .years
            .years()
            .map(|year| Self::cell(panel, units, id, year, predictor.indicator))
            .collect::<Result<Vec<_>>>()?;
        predictor
            .reduction
            .apply(&values)
            .ok_or(DataprepError::EmptyWindow {
                window: "predictor",
                range: predictor.years,
            })
    }

    fn outcome_block(
        panel: &Panel,
        units: &UnitIndex,
        treated_id: usize,
        control_ids: &[usize],
        outcome: Indicator,
        window: YearRange,
    ) -> Result<(Vec<i32>, Array1<f64>, Array2<f64>)> {
        let years: Vec<i32> = window.years().collect();
        let mut treated = Array1::zeros(years.len());
        let mut controls = Array2::zeros((years.len(), control_ids.len()));
        for (row, &year) in years.iter().enumerate() {
            treated[row] = Self::cell(panel, units, treated_id, year, outcome)?;
            for (col, &id) in control_ids.iter().enumerate() {
                controls[[row, col]] = Self::cell(panel, units, id, year, outcome)?;
            }
        }
        Ok((years, treated, controls))
    }
}
