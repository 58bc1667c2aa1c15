use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RequestOutcome;

/// Distribution summary of one latency series, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub stddev_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub total_output_units: usize,
    pub first_output: LatencyStats,
    pub total_latency: LatencyStats,
    /// Successful requests over the slowest successful latency.
    pub requests_per_second: f64,
    pub output_units_per_second: f64,
    pub tokens_per_second_mean: f64,
}

/// What the reducer produced for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    Metrics(AggregateMetrics),
    NoSuccessfulRequests { total_requests: usize },
}

/// Reduce outcomes (in any order) to aggregate statistics over the successes.
pub fn reduce(outcomes: &[RequestOutcome]) -> Reduction {
    let successes: Vec<(Duration, Duration, usize)> = outcomes
        .iter()
        .filter_map(|o| {
            Some((
                o.first_output_latency()?,
                o.total_latency()?,
                o.output_count(),
            ))
        })
        .collect();

    if successes.is_empty() {
        return Reduction::NoSuccessfulRequests {
            total_requests: outcomes.len(),
        };
    }

    let first_output_ms: Vec<f64> = successes.iter().map(|(f, _, _)| as_ms(*f)).collect();
    let total_ms: Vec<f64> = successes.iter().map(|(_, t, _)| as_ms(*t)).collect();

    let first_output = LatencyStats::from_samples(&first_output_ms);
    let total_latency = LatencyStats::from_samples(&total_ms);

    let span_secs = total_latency.max_ms / 1000.0;
    let units: usize = successes.iter().map(|(_, _, n)| n).sum();
    let (requests_per_second, output_units_per_second) = match span_secs > 0.0 {
        true => (
            successes.len() as f64 / span_secs,
            units as f64 / span_secs,
        ),
        false => (0.0, 0.0),
    };

    let per_request_rates: Vec<f64> = successes
        .iter()
        .filter(|(_, t, _)| !t.is_zero())
        .map(|(_, t, n)| *n as f64 / t.as_secs_f64())
        .collect();
    let tokens_per_second_mean = mean(&per_request_rates);

    Reduction::Metrics(AggregateMetrics {
        total_requests: outcomes.len(),
        successful_requests: successes.len(),
        failed_requests: outcomes.len() - successes.len(),
        total_output_units: units,
        first_output,
        total_latency,
        requests_per_second,
        output_units_per_second,
        tokens_per_second_mean,
    })
}

impl LatencyStats {
    /// Caller guarantees `samples` is non-empty.
    fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            mean_ms: mean(&sorted),
            median_ms: percentile(&sorted, 50.0),
            p90_ms: percentile(&sorted, 90.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            stddev_ms: sample_stddev(&sorted),
        }
    }
}

/// Linear-interpolation percentile at fractional rank `p/100 * (n-1)`.
/// `sorted` must be ascending.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean(values: &[f64]) -> f64 {
    match values.is_empty() {
        true => 0.0,
        false => values.iter().sum::<f64>() / values.len() as f64,
    }
}

fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
