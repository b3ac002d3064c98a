use super::panel::{Panel, PanelRow};
use crate::types::Indicator;
use serde::Serialize;
use tracing::{debug, warn};

/// A (country, indicator) series without a single known value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSeries {
    pub country: String,
    pub indicator: Indicator,
}

/// Fills absent values country by country with linear interpolation over
/// year. Outside the known range the nearest known value is held. Series with
/// no known value are left absent.
pub fn interpolate(panel: Panel) -> Panel {
    // Country runs must be contiguous and year-ordered; `rows` is public.
    let mut rows = Panel::new(panel.rows).rows;
    let mut filled = 0usize;

    let mut start = 0;
    while start < rows.len() {
        let end = start
            + rows[start..]
                .iter()
                .take_while(|row| row.country == rows[start].country)
                .count();
        filled += fill_country(&mut rows[start..end]);
        start = end;
    }

    let panel = Panel::new(rows);
    for gap in missing_series(&panel) {
        warn!(country = %gap.country, indicator = %gap.indicator, "no known values; series left absent");
    }
    debug!(filled, "interpolated missing values");
    panel
}

/// Series that interpolation could not fill.
pub fn missing_series(panel: &Panel) -> Vec<MissingSeries> {
    let mut missing = Vec::new();
    for country in panel.countries() {
        for indicator in Indicator::ALL {
            if panel.country_rows(country).all(|row| row.get(indicator).is_none()) {
                missing.push(MissingSeries {
                    country: country.to_string(),
                    indicator,
                });
            }
        }
    }
    missing
}

fn fill_country(rows: &mut [PanelRow]) -> usize {
    let mut filled = 0;
    for indicator in Indicator::ALL {
        let known: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|row| row.get(indicator).map(|value| (row.year as f64, value)))
            .collect();
        if known.is_empty() {
            continue;
        }
        for row in rows.iter_mut() {
            if row.get(indicator).is_none() {
                row.set(indicator, Some(interpolate_at(&known, row.year as f64)));
                filled += 1;
            }
        }
    }
    filled
}

/// Linear interpolation through `points` (sorted by x, non-empty), holding the
/// first and last values outside their range.
pub fn interpolate_at(points: &[(f64, f64)], x: f64) -> f64 {
    let (first_x, first_y) = points[0];
    let (last_x, last_y) = points[points.len() - 1];
    if x <= first_x {
        return first_y;
    }
    if x >= last_x {
        return last_y;
    }

    let upper = points.partition_point(|&(px, _)| px < x);
    let (x1, y1) = points[upper];
    if x1 == x {
        return y1;
    }
    let (x0, y0) = points[upper - 1];
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
