use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Macroeconomic indicators carried by the panel, one workbook sheet each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Inflation,
    Imports,
    PublicDebt,
    Deficit,
    Expenditure,
}

impl Indicator {
    pub const ALL: [Indicator; 5] = [
        Indicator::Inflation,
        Indicator::Imports,
        Indicator::PublicDebt,
        Indicator::Deficit,
        Indicator::Expenditure,
    ];

    /// Sheet name in the source workbook.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Indicator::Inflation => "Inflation",
            Indicator::Imports => "Imports",
            Indicator::PublicDebt => "Public Debt",
            Indicator::Deficit => "Deficit",
            Indicator::Expenditure => "Expenditure",
        }
    }

    /// Column key used in config files and exported tables.
    pub fn key(&self) -> &'static str {
        match self {
            Indicator::Inflation => "inflation",
            Indicator::Imports => "imports",
            Indicator::PublicDebt => "public_debt",
            Indicator::Deficit => "deficit",
            Indicator::Expenditure => "expenditure",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How a predictor's yearly values are collapsed into one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    Mean,
    Median,
    Last,
}

impl Reduction {
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Reduction::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Reduction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
            Reduction::Last => values.last().copied(),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::Last => "last",
        };
        f.write_str(name)
    }
}

/// Inclusive span of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
