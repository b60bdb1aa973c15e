use std::collections::HashSet;

use crate::parsing::trend_value;
use crate::types::{
    Confidence, MetricSample, Polarity, RunSnapshot, TrendDirection, TrendResult,
};

/// A trend is never asserted from fewer points than this.
pub const MIN_TREND_POINTS: usize = 3;
pub const STABLE_SLOPE_EPSILON: f64 = 0.01;
pub const HIGH_CONFIDENCE_R_SQUARED: f64 = 0.7;
pub const MEDIUM_CONFIDENCE_R_SQUARED: f64 = 0.4;

/// Chronologically ordered samples of one metric.
#[derive(Debug, Clone)]
pub struct TrendSeries {
    metric: String,
    samples: Vec<MetricSample>,
}

impl TrendSeries {
    /// Samples are stable-sorted by timestamp; input order is never trusted.
    pub fn new(metric: impl Into<String>, mut samples: Vec<MetricSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            metric: metric.into(),
            samples,
        }
    }

    /// Build the series for `metric` from run snapshots, keeping one sample per
    /// run. A repeated run id resolves to its most recent snapshot.
    pub fn from_snapshots(metric: &str, snapshots: &[RunSnapshot]) -> Self {
        let mut ordered: Vec<&RunSnapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|s| s.timestamp);

        let mut seen = HashSet::new();
        let mut latest: Vec<&RunSnapshot> = ordered
            .into_iter()
            .rev()
            .filter(|s| seen.insert(s.run_id.as_str()))
            .collect();
        latest.reverse();

        let samples = latest
            .into_iter()
            .filter_map(|s| {
                s.metrics.get(metric).map(|v| MetricSample {
                    metric_name: metric.to_string(),
                    value: *v,
                    timestamp: s.timestamp,
                })
            })
            .collect();

        Self {
            metric: metric.to_string(),
            samples,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values usable for regression, in chronological order.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().filter_map(|s| trend_value(s.value)).collect()
    }
}

impl TrendResult {
    pub fn insufficient() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            confidence: Confidence::Low,
            slope: 0.0,
            r_squared: 0.0,
            projected_next: 0.0,
            percent_change: 0.0,
        }
    }

    /// Worth surfacing: a non-stable direction the fit is at least moderately sure of.
    pub fn is_flagged(&self) -> bool {
        !matches!(
            self.direction,
            TrendDirection::Stable | TrendDirection::InsufficientData
        ) && self.confidence != Confidence::Low
    }
}

/// Fit an ordinary-least-squares line over `series` with `x = 0..n-1`.
pub fn analyze(series: &[f64]) -> TrendResult {
    let n = series.len();
    if n < MIN_TREND_POINTS {
        return TrendResult::insufficient();
    }

    let nf = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in series.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let mean_y = sum_y / nf;
    let ss_tot: f64 = series.iter().map(|y| (y - mean_y).powi(2)).sum();

    // The mean of a constant series can carry rounding error, so compare the
    // values themselves rather than testing ss_tot for zero.
    let (slope, intercept, r_squared) = if series.iter().all(|y| *y == series[0]) {
        // Flat line through the value, perfect fit.
        (0.0, series[0], 1.0)
    } else {
        let denominator = nf * sum_xx - sum_x * sum_x;
        let slope = (nf * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / nf;
        let ss_res: f64 = series
            .iter()
            .enumerate()
            .map(|(i, y)| {
                let predicted = slope * i as f64 + intercept;
                (y - predicted).powi(2)
            })
            .sum();
        (slope, intercept, 1.0 - ss_res / ss_tot)
    };

    let direction = if slope.abs() < STABLE_SLOPE_EPSILON {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Degrading
    } else {
        TrendDirection::Improving
    };

    let confidence = if r_squared > HIGH_CONFIDENCE_R_SQUARED {
        Confidence::High
    } else if r_squared > MEDIUM_CONFIDENCE_R_SQUARED {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let first = series[0];
    let last = series[n - 1];
    let percent_change = if first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    TrendResult {
        direction,
        confidence,
        slope,
        r_squared,
        projected_next: slope * nf + intercept,
        percent_change,
    }
}

/// Direction as a reader should see it: rising values of a higher-is-better
/// metric are an improvement, not a degradation.
pub fn presented_direction(direction: TrendDirection, polarity: Polarity) -> TrendDirection {
    match (polarity, direction) {
        (Polarity::HigherIsBetter, TrendDirection::Degrading) => TrendDirection::Improving,
        (Polarity::HigherIsBetter, TrendDirection::Improving) => TrendDirection::Degrading,
        (_, d) => d,
    }
}
