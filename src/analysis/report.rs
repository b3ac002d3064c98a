use super::ScmResult;
use ndarray::Axis;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Clone, Serialize)]
pub struct PredictorBalance {
    pub predictor: String,
    pub treated: f64,
    pub synthetic: f64,
    pub sample_mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictorWeight {
    pub predictor: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitWeight {
    pub unit_id: usize,
    pub country: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathPoint {
    pub year: i32,
    pub actual: f64,
    pub synthetic: f64,
    pub gap: f64,
    pub post_treatment: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub loss_w: f64,
    pub loss_v: f64,
    pub pre_rmspe: f64,
    pub post_rmspe: Option<f64>,
    pub rmspe_ratio: Option<f64>,
}

/// Tables describing a fitted synthetic control.
#[derive(Debug, Clone, Serialize)]
pub struct SynthReport {
    pub treated: String,
    pub outcome: String,
    pub treatment_year: i32,
    pub predictor_balance: Vec<PredictorBalance>,
    pub predictor_weights: Vec<PredictorWeight>,
    pub unit_weights: Vec<UnitWeight>,
    pub path: Vec<PathPoint>,
    pub fit: FitSummary,
}

impl SynthReport {
    pub fn from_result(result: &ScmResult) -> Self {
        let input = &result.input;
        let output = &result.output;
        let treatment_year = result.spec.treatment_year;

        let synthetic_predictors = input.x0.dot(&output.control_weights);
        let sample_means = input
            .x0
            .mean_axis(Axis(1))
            .unwrap_or_else(|| synthetic_predictors.mapv(|_| f64::NAN));
        let predictor_balance = input
            .predictor_labels
            .iter()
            .enumerate()
            .map(|(i, label)| PredictorBalance {
                predictor: label.clone(),
                treated: input.x1[i],
                synthetic: synthetic_predictors[i],
                sample_mean: sample_means[i],
            })
            .collect();

        let predictor_weights = input
            .predictor_labels
            .iter()
            .zip(output.predictor_weights.iter())
            .map(|(label, &weight)| PredictorWeight {
                predictor: label.clone(),
                weight,
            })
            .collect();

        let unit_weights = result
            .control_weights()
            .into_iter()
            .map(|(unit_id, country, weight)| UnitWeight {
                unit_id,
                country: country.to_string(),
                weight,
            })
            .collect();

        let synthetic = result.synthetic_path();
        let path: Vec<PathPoint> = input
            .plot_years
            .iter()
            .enumerate()
            .map(|(i, &year)| PathPoint {
                year,
                actual: input.y1[i],
                synthetic: synthetic[i],
                gap: input.y1[i] - synthetic[i],
                post_treatment: year >= treatment_year,
            })
            .collect();

        let pre_rmspe = rmspe(path.iter().filter(|p| !p.post_treatment)).unwrap_or(0.0);
        let post_rmspe = rmspe(path.iter().filter(|p| p.post_treatment));
        let rmspe_ratio = post_rmspe.filter(|_| pre_rmspe > 0.0).map(|post| post / pre_rmspe);

        Self {
            treated: result.spec.treated.clone(),
            outcome: result.spec.outcome.to_string(),
            treatment_year,
            predictor_balance,
            predictor_weights,
            unit_weights,
            path,
            fit: FitSummary {
                loss_w: output.loss_w,
                loss_v: output.loss_v,
                pre_rmspe,
                post_rmspe,
                rmspe_ratio,
            },
        }
    }

    pub fn print(&self) {
        println!(
            "\n=== Synthetic {} ({}, treatment {}) ===",
            self.treated, self.outcome, self.treatment_year
        );

        println!("\nPredictor balance:");
        println!(
            "{:<32} {:>12} {:>12} {:>12}",
            "Predictor", "Treated", "Synthetic", "Sample Mean"
        );
        println!("{:-<71}", "");
        for row in &self.predictor_balance {
            println!(
                "{:<32} {:>12.3} {:>12.3} {:>12.3}",
                row.predictor, row.treated, row.synthetic, row.sample_mean
            );
        }

        println!("\nPredictor weights (V):");
        for row in &self.predictor_weights {
            println!("{:<32} {:>8.4}", row.predictor, row.weight);
        }

        println!("\nUnit weights (W):");
        println!("{:<6} {:<20} {:>8}", "Id", "Country", "Weight");
        println!("{:-<36}", "");
        for row in &self.unit_weights {
            println!("{:<6} {:<20} {:>8.4}", row.unit_id, row.country, row.weight);
        }

        println!("\nLoss:");
        println!("loss W: {:.6}", self.fit.loss_w);
        println!("loss V (pre-treatment MSPE): {:.6}", self.fit.loss_v);

        println!("\nPath:");
        println!(
            "{:<6} {:>12} {:>12} {:>12}",
            "Year", "Actual", "Synthetic", "Gap"
        );
        println!("{:-<45}", "");
        for point in &self.path {
            let marker = if point.year == self.treatment_year { " <- treatment" } else { "" };
            println!(
                "{:<6} {:>12.3} {:>12.3} {:>12.3}{}",
                point.year, point.actual, point.synthetic, point.gap, marker
            );
        }

        println!("\nPre-treatment RMSPE: {:.4}", self.fit.pre_rmspe);
        match (self.fit.post_rmspe, self.fit.rmspe_ratio) {
            (Some(post), Some(ratio)) => {
                println!("Post-treatment RMSPE: {:.4} (ratio {:.2})", post, ratio)
            }
            (Some(post), None) => println!("Post-treatment RMSPE: {:.4}", post),
            _ => println!("No post-treatment years in plot window"),
        }
        println!();
    }

    /// Writes the actual-vs-synthetic path as CSV for plotting.
    pub fn write_path_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        for point in &self.path {
            wtr.serialize(point)?;
        }
        wtr.flush()?;
        info!(path = %path.display(), rows = self.path.len(), "wrote path CSV");
        Ok(())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), "wrote report JSON");
        Ok(())
    }
}

fn rmspe<'a>(points: impl Iterator<Item = &'a PathPoint>) -> Option<f64> {
    let (sum, count) = points.fold((0.0, 0usize), |(sum, count), p| (sum + p.gap * p.gap, count + 1));
    (count > 0).then(|| (sum / count as f64).sqrt())
}
