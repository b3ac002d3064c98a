pub mod dataprep;
pub mod optimize;
pub mod report;
pub mod synth;
pub mod units;

use crate::data::panel::Panel;
use dataprep::{Dataprep, ScmInput, ScmSpec};
use ndarray::Array1;
use synth::{ScmSolver, SolverOutput};
use thiserror::Error;
use tracing::info;
use units::UnitIndex;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Input validation error: {0}")]
    Dataprep(#[from] dataprep::DataprepError),
    #[error("Solver error: {0}")]
    Solver(#[from] synth::SolverError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// A solved synthetic control together with the inputs it was fitted on.
#[derive(Debug, Clone)]
pub struct ScmResult {
    pub spec: ScmSpec,
    pub units: UnitIndex,
    pub input: ScmInput,
    pub output: SolverOutput,
}

impl ScmResult {
    /// Synthetic outcome over the plot window.
    pub fn synthetic_path(&self) -> Array1<f64> {
        self.input.y0.dot(&self.output.control_weights)
    }

    /// Actual minus synthetic outcome over the plot window.
    pub fn gaps(&self) -> Array1<f64> {
        &self.input.y1 - &self.synthetic_path()
    }

    /// Control units with their weights, in id order.
    pub fn control_weights(&self) -> Vec<(usize, &str, f64)> {
        self.input
            .control_ids
            .iter()
            .zip(self.output.control_weights.iter())
            .map(|(&id, &w)| (id, self.units.name(id).unwrap_or_default(), w))
            .collect()
    }
}

/// Builds unit ids and solver input from an interpolated panel and runs
/// `solver` on it.
pub fn estimate<S: ScmSolver>(panel: &Panel, spec: &ScmSpec, solver: &S) -> Result<ScmResult> {
    let units = UnitIndex::from_panel(panel);
    info!(
        units = units.len(),
        treated = %spec.treated,
        outcome = %spec.outcome,
        "preparing synthetic control"
    );

    let input = Dataprep::build(panel, &units, spec)?;
    let output = solver.solve(&input)?;

    Ok(ScmResult {
        spec: spec.clone(),
        units,
        input,
        output,
    })
}
