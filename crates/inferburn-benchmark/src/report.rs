use std::path::Path;

use inferburn_core::{InferBurnError, LatencyStats, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::evaluation::EvaluationReport;
use crate::sweep::RunReport;

const TTFT_TARGET_MS: f64 = 500.0;
const LATENCY_TARGET_MS: f64 = 2000.0;

/// Pretty-print `value` to `path`, creating parent directories and
/// replacing any existing file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| InferBurnError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, body).map_err(|source| InferBurnError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Results saved to {}", path.display());
    Ok(())
}

/// JSON document for a run: the bare report for a single level, otherwise
/// an object keyed `concurrency_<N>` in sweep order.
pub fn run_document(reports: &[RunReport], keyed: bool) -> Result<Value> {
    if let (false, [only]) = (keyed, reports) {
        return Ok(serde_json::to_value(only)?);
    }

    let mut levels = Map::new();
    for report in reports {
        levels.insert(
            format!("concurrency_{}", report.concurrency),
            serde_json::to_value(report)?,
        );
    }
    Ok(Value::Object(levels))
}

pub fn render_run_summary(report: &RunReport) -> String {
    let m = &report.metrics;
    let ttft = m.first_output.mean_ms;
    let latency = m.total_latency.mean_ms;

    let mut lines = vec![
        rule('=', 60),
        format!("Results for Concurrency {}", report.concurrency),
        rule('=', 60),
        format!(
            "  Requests:           {}/{} successful ({:.1}%)",
            m.successful_requests,
            m.total_requests,
            percent(m.successful_requests, m.total_requests)
        ),
        format!("  Failed:             {}", m.failed_requests),
        format!("  Total Time:         {:.2}s", report.elapsed_seconds),
        format!(
            "  Throughput:         {:.2} req/s (wall {:.2} req/s)",
            m.requests_per_second, report.wall_requests_per_second
        ),
        format!(
            "  Output Throughput:  {:.1} units/s (wall {:.1} units/s)",
            m.output_units_per_second, report.wall_output_units_per_second
        ),
        format!("  Tokens/sec (mean):  {:.2}", m.tokens_per_second_mean),
        String::new(),
        "  Time to First Output:".to_string(),
    ];
    lines.extend(latency_rows(&m.first_output));
    lines.push(String::new());
    lines.push("  End-to-End Latency:".to_string());
    lines.extend(latency_rows(&m.total_latency));
    lines.extend([
        String::new(),
        "  Performance Targets:".to_string(),
        format!("    TTFT < 500ms:     {} ({:.2} ms)", mark(ttft < TTFT_TARGET_MS), ttft),
        format!("    Latency < 2s:     {} ({:.2} ms)", mark(latency < LATENCY_TARGET_MS), latency),
        rule('=', 60),
    ]);
    lines.join("\n")
}

fn latency_rows(stats: &LatencyStats) -> Vec<String> {
    [
        ("Min", stats.min_ms),
        ("Mean", stats.mean_ms),
        ("Median (P50)", stats.median_ms),
        ("P90", stats.p90_ms),
        ("P95", stats.p95_ms),
        ("P99", stats.p99_ms),
        ("Max", stats.max_ms),
        ("Std Dev", stats.stddev_ms),
    ]
    .into_iter()
    .map(|(label, value)| format!("    {:<18}{:.0}ms", format!("{}:", label), value))
    .collect()
}

/// One row per level, in the order given.
pub fn render_comparison_table(reports: &[RunReport]) -> String {
    let mut lines = vec![
        rule('=', 80),
        "PERFORMANCE COMPARISON TABLE".to_string(),
        rule('=', 80),
        format!(
            "{:<15} {:<15} {:<15} {:<15} {:<15}",
            "Concurrency", "Throughput", "Mean Latency", "P95 Latency", "TTFT P95"
        ),
        rule('-', 80),
    ];
    lines.extend(reports.iter().map(|report| {
        let m = &report.metrics;
        format!(
            "{:<15} {:<15} {:<15} {:<15} {:<15}",
            report.concurrency,
            format!("{:.1} req/s", m.requests_per_second),
            format!("{:.0}ms", m.total_latency.mean_ms),
            format!("{:.0}ms", m.total_latency.p95_ms),
            format!("{:.0}ms", m.first_output.p95_ms),
        )
    }));
    lines.push(rule('=', 80));
    lines.join("\n")
}

pub fn render_evaluation_summary(report: &EvaluationReport) -> String {
    let dataset = Path::new(&report.dataset)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.dataset.clone());

    [
        rule('=', 70),
        "BFCL EVALUATION RESULTS".to_string(),
        rule('=', 70),
        format!("Dataset:          {}", dataset),
        format!("Total Samples:    {}", report.total),
        format!("Correct:          {}", report.correct),
        format!("Incorrect:        {}", report.incorrect),
        format!("Errors:           {}", report.errors),
        String::new(),
        format!("Accuracy:         {:.2}%", report.accuracy * 100.0),
        format!("Success Rate:     {:.2}%", report.success_rate * 100.0),
        rule('=', 70),
    ]
    .join("\n")
}

fn rule(ch: char, width: usize) -> String {
    ch.to_string().repeat(width)
}

fn percent(part: usize, whole: usize) -> f64 {
    match whole {
        0 => 0.0,
        w => 100.0 * part as f64 / w as f64,
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}
