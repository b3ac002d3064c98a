use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::dataprep::{PredictorSpec, ScmSpec};
use crate::analysis::synth::SolverSettings;
use crate::data::filter::default_excluded_countries;
use crate::types::{Indicator, Reduction, YearRange};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub indicator: Indicator,
    /// Defaults to the pre-treatment window.
    #[serde(default)]
    pub years: Option<YearRange>,
    #[serde(default)]
    pub reduction: Reduction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScmSettings {
    #[serde(default = "default_treated")]
    pub treated: String,
    pub outcome: Indicator,
    pub treatment_year: i32,
    pub predictors: Vec<PredictorConfig>,
    pub pre_treatment: YearRange,
    /// Defaults to the pre-treatment window.
    #[serde(default)]
    pub optimization: Option<YearRange>,
    pub plot: YearRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default = "default_excluded_countries")]
    pub excluded_countries: Vec<String>,
    pub scm: ScmSettings,
    #[serde(default)]
    pub solver: SolverSettings,
}

fn default_treated() -> String {
    "Germany".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let scm = &self.scm;
        let windows = [
            ("pre_treatment", Some(scm.pre_treatment)),
            ("optimization", scm.optimization),
            ("plot", Some(scm.plot)),
        ];
        for (name, window) in windows {
            if let Some(window) = window {
                if window.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{name} window {window} is empty"
                    )));
                }
            }
        }
        if scm.predictors.is_empty() {
            return Err(ConfigError::Invalid("at least one predictor is required".into()));
        }
        if let Some(predictor) = scm
            .predictors
            .iter()
            .find(|p| p.years.is_some_and(|y| y.is_empty()))
        {
            return Err(ConfigError::Invalid(format!(
                "predictor {} has an empty year window",
                predictor.indicator
            )));
        }
        if !scm.plot.contains(scm.treatment_year) {
            return Err(ConfigError::Invalid(format!(
                "treatment year {} outside plot window {}",
                scm.treatment_year, scm.plot
            )));
        }
        if scm.pre_treatment.end >= scm.treatment_year {
            return Err(ConfigError::Invalid(format!(
                "pre-treatment window {} must end before treatment year {}",
                scm.pre_treatment, scm.treatment_year
            )));
        }
        if self.solver.max_outer_iterations == 0 || self.solver.max_inner_iterations == 0 {
            return Err(ConfigError::Invalid("solver iterations must be positive".into()));
        }
        Ok(())
    }

    pub fn to_spec(&self) -> ScmSpec {
        let scm = &self.scm;
        ScmSpec {
            treated: scm.treated.clone(),
            outcome: scm.outcome,
            treatment_year: scm.treatment_year,
            predictors: scm
                .predictors
                .iter()
                .map(|p| PredictorSpec {
                    indicator: p.indicator,
                    years: p.years.unwrap_or(scm.pre_treatment),
                    reduction: p.reduction,
                })
                .collect(),
            pre_treatment: scm.pre_treatment,
            optimization: scm.optimization.unwrap_or(scm.pre_treatment),
            plot: scm.plot,
        }
    }
}
