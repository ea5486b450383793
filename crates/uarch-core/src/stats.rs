//! Small statistics used across the analyzers.

use crate::error::StatsError;

/// Trials per measurement in the leak experiments.
pub const TOTAL_ITERATIONS: f64 = 100_000.0;

/// Round to `digits` decimals, ties to even on the exact binary value.
pub fn round_to(value: f64, digits: usize) -> f64 {
    format!("{value:.digits$}").parse().unwrap_or(value)
}

/// Hit count as a percentage of `total`, one decimal.
pub fn pct_of(hits: f64, total: f64) -> f64 {
    round_to((hits / total) * 100.0, 1)
}

/// Hit count as a percentage of [`TOTAL_ITERATIONS`], one decimal.
pub fn pct(hits: f64) -> f64 {
    pct_of(hits, TOTAL_ITERATIONS)
}

/// Median; the mean of the two middle values for even-sized samples.
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::Empty);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[mid])
    } else {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

pub fn geometric_mean(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::Empty);
    }
    if values.iter().any(|v| *v <= 0.0 || v.is_nan()) {
        return Err(StatsError::NonPositive);
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    Ok((log_sum / values.len() as f64).exp())
}

/// Element-wise median across repeated runs, one value per metric.
///
/// Every run must report the same metrics in the same order.
pub fn median_per_metric(runs: &[Vec<f64>]) -> Result<Vec<f64>, StatsError> {
    let first = runs.first().ok_or(StatsError::Empty)?;
    if runs.iter().any(|run| run.len() != first.len()) {
        return Err(StatsError::MismatchedRuns);
    }
    (0..first.len())
        .map(|i| {
            let column: Vec<f64> = runs.iter().map(|run| run[i]).collect();
            median(&column)
        })
        .collect()
}

/// Suite score: median across runs per metric, then geometric mean across
/// metrics.
pub fn suite_score(runs: &[Vec<f64>]) -> Result<f64, StatsError> {
    geometric_mean(&median_per_metric(runs)?)
}

/// Which way a benchmark improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Throughput-style scores.
    HigherIsBetter,
    /// Latency-style timings.
    LowerIsBetter,
}

/// Overhead of `treatment` relative to `baseline` in percent, one decimal.
///
/// Positive values mean the treatment is slower, whatever the direction.
pub fn overhead_pct(baseline: f64, treatment: f64, direction: Direction) -> f64 {
    let ratio = match direction {
        Direction::HigherIsBetter => baseline / treatment,
        Direction::LowerIsBetter => treatment / baseline,
    };
    round_to((ratio - 1.0) * 100.0, 1)
}

/// A hit rate judged against the noise floor of the same run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Above the noise floor.
    Leak(f64),
    /// At or below the noise floor.
    Noise(f64),
}

impl Signal {
    pub fn classify(value: f64, noise_floor: f64) -> Self {
        if value > noise_floor {
            Signal::Leak(value)
        } else {
            Signal::Noise(value)
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Signal::Leak(v) | Signal::Noise(v) => v,
        }
    }
}
