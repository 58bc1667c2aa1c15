mod common;

use std::io::Write;

use inferburn_benchmark::{
    write_json, CompletionsClient, EvaluationReport, EvaluationRunner, SampleDetail,
};
use inferburn_core::{load_dataset, EvalConfig};

use common::{completions_server, dead_endpoint, serve};

const DATASET: &str = r#"[
    {
        "id": "simple_0",
        "question": [[{"role": "user", "content": "Weather in Paris today?"}]],
        "function": [{
            "name": "get_weather",
            "description": "Current weather for a city",
            "parameters": {
                "type": "dict",
                "properties": {"city": {"type": "string", "description": "City name"}},
                "required": ["city"]
            }
        }]
    },
    {
        "question": [[{"role": "user", "content": "Stock price of AAPL?"}]],
        "function": [{
            "name": "get_stock",
            "parameters": {"properties": {"ticker": {"type": "string"}}, "required": ["ticker"]}
        }]
    },
    {
        "id": "simple_2",
        "question": [[{"role": "user", "content": "please explode"}]],
        "function": [{"name": "noop"}]
    },
    {"id": "simple_3", "question": [[]], "function": [{"name": "noop"}]},
    {"id": "simple_4", "question": [[{"role": "user", "content": "no tools"}]], "function": []},
    {"id": "simple_5", "question": [[{"role": "user", "content": "Weather beyond the limit"}]]}
]"#;

fn dataset_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DATASET.as_bytes()).unwrap();
    file
}

fn config(endpoint: &str, dataset: &std::path::Path) -> EvalConfig {
    EvalConfig {
        dataset: dataset.to_path_buf(),
        endpoint: endpoint.to_string(),
        model: "qwen".to_string(),
        limit: 5,
        delay_ms: 0,
        timeout_secs: 10,
    }
}

async fn evaluate(endpoint: &str) -> EvaluationReport {
    let file = dataset_file();
    let config = config(endpoint, file.path());
    let samples = load_dataset(&config.dataset, config.limit).unwrap();

    EvaluationRunner::new(CompletionsClient::new(endpoint), &config)
        .run("data/bfcl_simple_parsed.json", &samples)
        .await
}

#[tokio::test]
async fn scores_a_dataset_end_to_end() {
    let base = serve(completions_server()).await;
    let report = evaluate(&base).await;

    assert_eq!(report.dataset, "data/bfcl_simple_parsed.json");
    assert_eq!(report.total, 5);
    assert_eq!(report.correct, 1);
    assert_eq!(report.incorrect, 1);
    // one API failure plus two samples that could not be asked
    assert_eq!(report.errors, 3);
    assert!((report.accuracy - 0.2).abs() < 1e-9);
    assert!((report.success_rate - 0.4).abs() < 1e-9);
    assert_eq!(report.details.len(), 3);

    match &report.details[0] {
        SampleDetail::Evaluated { id, correct, message, predicted_response, parsed, .. } => {
            assert_eq!(id, "simple_0");
            assert!(*correct);
            assert_eq!(message, "Correct function and parameters");
            // reply text is trimmed before scoring
            assert_eq!(predicted_response, "{\"function\": \"get_weather\", \"city\": \"Paris\"}");
            assert_eq!(parsed["city"], "Paris");
        }
        other => panic!("unexpected detail {:?}", other),
    }

    match &report.details[1] {
        SampleDetail::Evaluated { id, correct, message, expected_functions, .. } => {
            assert_eq!(id, "sample_1");
            assert!(!*correct);
            // the innermost flat object is the empty `arguments` value
            assert_eq!(message, "No valid JSON found");
            assert_eq!(expected_functions, &vec!["get_stock".to_string()]);
        }
        other => panic!("unexpected detail {:?}", other),
    }

    match &report.details[2] {
        SampleDetail::Error { id, error, status, .. } => {
            assert_eq!(id, "simple_2");
            assert_eq!(error, "HTTP 503: overloaded");
            assert_eq!(status, "error");
        }
        other => panic!("unexpected detail {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_server_counts_every_sample_as_an_error() {
    let base = dead_endpoint().await;
    let report = evaluate(&base).await;

    assert_eq!(report.correct + report.incorrect, 0);
    assert_eq!(report.errors, 5);
    assert_eq!(report.accuracy, 0.0);
    assert!(report
        .details
        .iter()
        .all(|d| matches!(d, SampleDetail::Error { error, .. } if error.starts_with("connection failed"))));
}

#[tokio::test]
async fn report_persists_with_both_detail_shapes() {
    let base = serve(completions_server()).await;
    let report = evaluate(&base).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("bfcl_real_results.json");
    write_json(&path, &report).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["total"], 5);
    assert_eq!(raw["details"][0]["correct"], true);
    assert_eq!(raw["details"][2]["status"], "error");

    let back: EvaluationReport = serde_json::from_value(raw).unwrap();
    assert_eq!(back.details, report.details);
}
