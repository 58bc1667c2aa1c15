use std::time::{Duration, Instant};

use inferburn_core::{reduce, AggregateMetrics, Reduction, RunConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::controller::ConcurrencyController;

/// Persisted result of one concurrency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub concurrency: usize,
    /// Wall time from first admission to last settled request.
    pub elapsed_seconds: f64,
    pub wall_requests_per_second: f64,
    pub wall_output_units_per_second: f64,
    #[serde(flatten)]
    pub metrics: AggregateMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LevelResult {
    Completed(RunReport),
    AllFailed {
        concurrency: usize,
        total_requests: usize,
    },
}

impl RunReport {
    pub fn new(concurrency: usize, elapsed: Duration, metrics: AggregateMetrics) -> Self {
        let secs = elapsed.as_secs_f64();
        let (wall_requests_per_second, wall_output_units_per_second) = match secs > 0.0 {
            true => (
                metrics.successful_requests as f64 / secs,
                metrics.total_output_units as f64 / secs,
            ),
            false => (0.0, 0.0),
        };

        Self {
            concurrency,
            elapsed_seconds: secs,
            wall_requests_per_second,
            wall_output_units_per_second,
            metrics,
        }
    }
}

/// Run one concurrency level end to end and reduce its outcomes.
pub async fn run_level(
    controller: &ConcurrencyController,
    config: &RunConfig,
) -> inferburn_core::Result<LevelResult> {
    info!(
        concurrency = config.concurrency,
        total = config.total_requests,
        "Benchmarking concurrency level"
    );

    let started = Instant::now();
    let outcomes = controller.run(config).await?;
    let elapsed = started.elapsed();

    match reduce(&outcomes) {
        Reduction::Metrics(metrics) => Ok(LevelResult::Completed(RunReport::new(
            config.concurrency,
            elapsed,
            metrics,
        ))),
        Reduction::NoSuccessfulRequests { total_requests } => {
            warn!(concurrency = config.concurrency, "All requests failed");
            Ok(LevelResult::AllFailed {
                concurrency: config.concurrency,
                total_requests,
            })
        }
    }
}

/// Run each level in turn against the same transport.
pub async fn run_sweep(
    controller: &ConcurrencyController,
    base: &RunConfig,
    levels: &[usize],
) -> inferburn_core::Result<Vec<LevelResult>> {
    let mut results = Vec::with_capacity(levels.len());
    for &level in levels {
        results.push(run_level(controller, &base.with_concurrency(level)).await?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RequestDriver;
    use crate::transport::{InferenceTransport, Reply, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Fixed {
        fail: bool,
    }

    #[async_trait]
    impl InferenceTransport for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn send(&self, _prompt: &str) -> Result<Reply, TransportError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            match self.fail {
                true => Err(TransportError::Connect("refused".to_string())),
                false => Ok(Reply::Atomic("four words of output".to_string())),
            }
        }

        async fn health_check(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn controller(fail: bool) -> ConcurrencyController {
        ConcurrencyController::new(RequestDriver::new(
            Arc::new(Fixed { fail }),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn sweep_reports_each_level() {
        let base = RunConfig {
            total_requests: 6,
            ..RunConfig::default()
        };
        let results = run_sweep(&controller(false), &base, &[1, 3]).await.unwrap();

        assert_eq!(results.len(), 2);
        for (result, level) in results.iter().zip([1, 3]) {
            let LevelResult::Completed(report) = result else {
                panic!("expected a completed level");
            };
            assert_eq!(report.concurrency, level);
            assert_eq!(report.metrics.successful_requests, 6);
            assert!(report.elapsed_seconds > 0.0);
            assert!(report.wall_requests_per_second > 0.0);
            // 4 words per reply
            assert!((report.wall_output_units_per_second - 24.0 / report.elapsed_seconds).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn all_failed_level_is_flagged() {
        let base = RunConfig {
            total_requests: 3,
            ..RunConfig::default()
        };
        let result = run_level(&controller(true), &base.with_concurrency(2)).await.unwrap();
        assert_eq!(
            result,
            LevelResult::AllFailed {
                concurrency: 2,
                total_requests: 3
            }
        );
    }

    #[test]
    fn report_flattens_metrics_in_json() {
        let report = RunReport::new(
            8,
            Duration::from_secs(2),
            AggregateMetrics {
                total_requests: 4,
                successful_requests: 4,
                ..AggregateMetrics::default()
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["concurrency"], 8);
        assert_eq!(json["successful_requests"], 4);
        assert_eq!(json["wall_requests_per_second"], 2.0);
        assert!(json.get("metrics").is_none());

        let back: RunReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
