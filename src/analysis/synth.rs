use super::dataprep::ScmInput;
use super::optimize::{nelder_mead, weighted_simplex_regression};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Invalid data dimensions: {0}")]
    InvalidDimensions(String),
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    pub outer_tolerance: f64,
    pub inner_tolerance: f64,
    /// Initial simplex edge for the predictor-weight search.
    pub initial_step: f64,
    /// Rescale each predictor by its standard deviation across units.
    pub standardize_predictors: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_outer_iterations: 1_000,
            max_inner_iterations: 10_000,
            outer_tolerance: 1e-12,
            inner_tolerance: 1e-12,
            initial_step: 0.5,
            standardize_predictors: true,
        }
    }
}

/// Weights and fit statistics produced by a solver.
#[derive(Clone, Debug, Serialize)]
pub struct SolverOutput {
    /// V: one non-negative weight per predictor, summing to one.
    pub predictor_weights: Array1<f64>,
    /// W: one non-negative weight per control unit, summing to one.
    pub control_weights: Array1<f64>,
    /// Weighted predictor discrepancy at (V, W).
    pub loss_w: f64,
    /// Mean squared outcome error over the optimization window.
    pub loss_v: f64,
}

/// Finds synthetic-control weights for prepared input.
pub trait ScmSolver {
    fn solve(&self, input: &ScmInput) -> Result<SolverOutput>;
}

/// Nested optimisation: W minimises the V-weighted predictor distance on the
/// simplex, V is searched to minimise the pre-treatment outcome MSPE.
#[derive(Debug, Clone, Default)]
pub struct NestedSimplexSolver {
    settings: SolverSettings,
}

impl NestedSimplexSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    fn control_weights(&self, x1: ArrayView1<f64>, x0: &Array2<f64>, v: ArrayView1<f64>) -> Array1<f64> {
        weighted_simplex_regression(
            x0.view(),
            x1,
            v,
            self.settings.max_inner_iterations,
            self.settings.inner_tolerance,
        )
    }
}

impl ScmSolver for NestedSimplexSolver {
    fn solve(&self, input: &ScmInput) -> Result<SolverOutput> {
        validate(input)?;

        let (x1, x0) = if self.settings.standardize_predictors {
            standardize(&input.x1, &input.x0)
        } else {
            (input.x1.clone(), input.x0.clone())
        };
        let k = x1.len();

        let outcome_loss = |w: &Array1<f64>| mspe(&input.z1, &input.z0.dot(w));
        let evaluate = |params: &[f64]| {
            let v = params_to_weights(params);
            let w = self.control_weights(x1.view(), &x0, v.view());
            outcome_loss(&w)
        };

        let predictor_weights = if k == 1 {
            Array1::ones(1)
        } else {
            let mut starts = vec![vec![1.0; k]];
            for i in 0..k {
                let mut start = vec![0.1; k];
                start[i] = 1.0;
                starts.push(start);
            }

            let mut best: Option<(Vec<f64>, f64)> = None;
            for start in &starts {
                let (params, value) = nelder_mead(
                    &evaluate,
                    start,
                    self.settings.initial_step,
                    self.settings.max_outer_iterations,
                    self.settings.outer_tolerance,
                );
                debug!(loss_v = value, "predictor weight search finished");
                if best.as_ref().map_or(true, |(_, v)| value < *v) {
                    best = Some((params, value));
                }
            }
            let (params, _) = best.unwrap_or_else(|| (vec![1.0; k], f64::INFINITY));
            params_to_weights(&params)
        };

        let control_weights = self.control_weights(x1.view(), &x0, predictor_weights.view());
        let gap = &x1 - &x0.dot(&control_weights);
        let loss_w = (&gap * &gap * &predictor_weights).sum();
        let loss_v = outcome_loss(&control_weights);

        info!(loss_w, loss_v, "synthetic control solved");

        Ok(SolverOutput {
            predictor_weights,
            control_weights,
            loss_w,
            loss_v,
        })
    }
}

fn validate(input: &ScmInput) -> Result<()> {
    let k = input.x1.len();
    let j = input.control_ids.len();
    if k == 0 || j == 0 {
        return Err(SolverError::InvalidDimensions(format!(
            "{k} predictors, {j} controls"
        )));
    }
    if input.x0.dim() != (k, j) {
        return Err(SolverError::InvalidDimensions(format!(
            "predictor matrix is {:?}, expected ({k}, {j})",
            input.x0.dim()
        )));
    }
    if input.z1.is_empty() || input.z0.dim() != (input.z1.len(), j) {
        return Err(SolverError::InvalidDimensions(format!(
            "outcome matrix is {:?} for {} years",
            input.z0.dim(),
            input.z1.len()
        )));
    }
    if input.y0.dim() != (input.y1.len(), j) {
        return Err(SolverError::InvalidDimensions(format!(
            "plot matrix is {:?} for {} years",
            input.y0.dim(),
            input.y1.len()
        )));
    }

    if !all_finite(input.x1.iter().chain(input.x0.iter())) {
        return Err(SolverError::NonFinite("predictors"));
    }
    if !all_finite(input.z1.iter().chain(input.z0.iter())) {
        return Err(SolverError::NonFinite("optimization outcomes"));
    }
    Ok(())
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

/// Divides each predictor row by its sample standard deviation across the
/// treated and control units. Constant rows are left unscaled.
fn standardize(x1: &Array1<f64>, x0: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let mut x1 = x1.clone();
    let mut x0 = x0.clone();
    for (i, mut row) in x0.axis_iter_mut(Axis(0)).enumerate() {
        let n = (row.len() + 1) as f64;
        let mean = (row.sum() + x1[i]) / n;
        let ss = row.iter().map(|x| (x - mean).powi(2)).sum::<f64>() + (x1[i] - mean).powi(2);
        let sd = (ss / (n - 1.0)).sqrt();
        if sd > f64::EPSILON {
            row.mapv_inplace(|x| x / sd);
            x1[i] /= sd;
        }
    }
    (x1, x0)
}

/// Maps unconstrained search parameters to simplex weights.
fn params_to_weights(params: &[f64]) -> Array1<f64> {
    let abs = Array1::from_iter(params.iter().map(|p| p.abs()));
    let total = abs.sum();
    if total > f64::EPSILON && total.is_finite() {
        abs / total
    } else {
        Array1::from_elem(params.len(), 1.0 / params.len() as f64)
    }
}

/// Mean squared difference between actual and synthetic series.
pub fn mspe(actual: &Array1<f64>, synthetic: &Array1<f64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let diff = actual - synthetic;
    diff.dot(&diff) / actual.len() as f64
}
