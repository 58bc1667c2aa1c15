use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inferburn_benchmark::{
    render_comparison_table, render_evaluation_summary, render_run_summary, run_document,
    run_sweep, write_json, CompletionSettings, CompletionsClient, CompletionsTransport,
    ConcurrencyController, EvaluationRunner, InferenceTransport, LevelResult, RequestDriver,
    RunReport, TransportError, TritonClient, TritonTransport,
};
use inferburn_core::config::{
    COMPLETIONS_TIMEOUT_SECS, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_PROMPT,
    DEFAULT_TRITON_MODEL, EVAL_TIMEOUT_SECS, FUNCTION_CALL_PROMPTS, TRITON_TIMEOUT_SECS,
};
use inferburn_core::{load_dataset, parse_concurrency_levels, EvalConfig, InferBurnError, RunConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inferburn")]
#[command(about = "InferBurn - LLM inference load testing and function-calling evaluation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load-test an OpenAI-compatible completions server (vLLM)
    Completions(CompletionsArgs),

    /// Load-test a Triton server over the KServe v2 HTTP protocol
    Triton(TritonArgs),

    /// Score function-calling accuracy on a BFCL-style dataset
    Eval(EvalArgs),

    /// Check server health
    Status {
        /// Completions server URL
        #[arg(long, env = "VLLM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Triton server URL
        #[arg(long, env = "TRITON_URL")]
        triton: Option<String>,
    },
}

#[derive(Args)]
struct CompletionsArgs {
    /// Server root; a trailing /v1 is accepted
    #[arg(long, env = "VLLM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Model name or path as served
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Requests per concurrency level
    #[arg(long, default_value = "32")]
    requests: usize,

    /// Concurrency level, or a comma-separated list to sweep
    #[arg(long, default_value = "16")]
    concurrency: String,

    /// Prompt to send; repeat to build a round-robin pool
    #[arg(long = "prompt")]
    prompts: Vec<String>,

    /// Request whole completions instead of streaming
    #[arg(long)]
    no_stream: bool,

    #[arg(long, default_value = "200")]
    max_tokens: u32,

    #[arg(long, default_value = "0.7")]
    temperature: f32,

    /// Label used in the default output file name
    #[arg(long, default_value = "qlora")]
    model_version: String,

    /// Output file [default: benchmark_results_{version}_{levels}concurrent.json]
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = COMPLETIONS_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[arg(long)]
    skip_health_check: bool,
}

#[derive(Args)]
struct TritonArgs {
    #[arg(long, env = "TRITON_URL", default_value = DEFAULT_ENDPOINT)]
    triton_url: String,

    #[arg(long, default_value = DEFAULT_TRITON_MODEL)]
    model: String,

    /// Comma-separated concurrency levels to sweep
    #[arg(long, default_value = "1,8,16,24,32")]
    concurrency: String,

    /// Requests per concurrency level
    #[arg(long, default_value = "100")]
    num_requests: usize,

    #[arg(long, default_value = "100")]
    max_tokens: u32,

    /// Prompt to send; repeat to build a round-robin pool
    #[arg(long = "prompt")]
    prompts: Vec<String>,

    #[arg(long, default_value = "results/triton_performance.json")]
    output: PathBuf,

    #[arg(long, default_value_t = TRITON_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[arg(long)]
    skip_health_check: bool,
}

#[derive(Args)]
struct EvalArgs {
    #[arg(long, default_value = "data/bfcl_simple_parsed.json")]
    dataset: PathBuf,

    #[arg(long, env = "VLLM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Number of samples to evaluate
    #[arg(long, default_value = "100")]
    limit: usize,

    #[arg(long, default_value = "results/bfcl_real_results.json")]
    output: PathBuf,

    /// Pause between samples
    #[arg(long, default_value = "50")]
    delay_ms: u64,

    #[arg(long, default_value_t = EVAL_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Completions(args) => cmd_completions(args).await,
        Commands::Triton(args) => cmd_triton(args).await,
        Commands::Eval(args) => cmd_eval(args).await,
        Commands::Status { endpoint, triton } => cmd_status(&endpoint, triton.as_deref()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_completions(args: CompletionsArgs) -> Result<()> {
    let levels = parse_concurrency_levels(&args.concurrency)?;
    let prompts = match args.prompts.is_empty() {
        true => vec![DEFAULT_PROMPT.to_string()],
        false => args.prompts,
    };

    let config = RunConfig {
        endpoint: args.endpoint,
        model: args.model,
        total_requests: args.requests,
        concurrency: levels[0],
        prompts,
        stream: !args.no_stream,
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        timeout_secs: args.timeout_secs,
    };
    config.validate()?;

    let output = args.output.unwrap_or_else(|| {
        let label = levels.iter().map(|l| l.to_string()).collect::<Vec<_>>().join("-");
        PathBuf::from(format!(
            "benchmark_results_{}_{}concurrent.json",
            args.model_version, label
        ))
    });

    println!();
    println!("{:=<60}", "");
    println!("Benchmarking Inference Performance");
    println!("{:=<60}", "");
    println!("  Endpoint:        {}", config.endpoint);
    println!("  Model:           {}", config.model);
    println!("  Total requests:  {}", config.total_requests);
    println!("  Concurrency:     {}", args.concurrency);
    println!("  Streaming:       {}", config.stream);
    println!("{:=<60}", "");

    let client = CompletionsClient::new(&config.endpoint);
    let transport = CompletionsTransport::new(client, CompletionSettings::from(&config));
    sweep_and_save(Arc::new(transport), &config, &levels, &output, args.skip_health_check).await
}

async fn cmd_triton(args: TritonArgs) -> Result<()> {
    let levels = parse_concurrency_levels(&args.concurrency)?;
    let prompts = match args.prompts.is_empty() {
        true => FUNCTION_CALL_PROMPTS.iter().map(|p| p.to_string()).collect(),
        false => args.prompts,
    };

    let config = RunConfig {
        endpoint: args.triton_url,
        model: args.model,
        total_requests: args.num_requests,
        concurrency: levels[0],
        prompts,
        stream: false,
        max_tokens: args.max_tokens,
        temperature: 0.0,
        timeout_secs: args.timeout_secs,
    };
    config.validate()?;

    println!();
    println!("{:=<60}", "");
    println!("Triton Inference Server Performance Benchmark");
    println!("{:=<60}", "");
    println!("  Triton URL:      {}", config.endpoint);
    println!("  Model:           {}", config.model);
    println!("  Requests/level:  {}", config.total_requests);
    println!("  Concurrency:     {:?}", levels);
    println!("{:=<60}", "");

    let client = TritonClient::new(&config.endpoint);
    let transport = TritonTransport::new(client, config.model.clone(), config.max_tokens);
    sweep_and_save(Arc::new(transport), &config, &levels, &args.output, args.skip_health_check).await
}

async fn sweep_and_save(
    transport: Arc<dyn InferenceTransport>,
    config: &RunConfig,
    levels: &[usize],
    output: &std::path::Path,
    skip_health_check: bool,
) -> Result<()> {
    if !skip_health_check {
        ensure_ready(transport.as_ref(), &config.endpoint).await?;
    }

    let controller = ConcurrencyController::new(RequestDriver::new(transport, config.timeout()));
    let results = run_sweep(&controller, config, levels).await?;

    let mut reports: Vec<RunReport> = Vec::with_capacity(results.len());
    for result in results {
        match result {
            LevelResult::Completed(report) => {
                println!();
                println!("{}", render_run_summary(&report));
                reports.push(report);
            }
            LevelResult::AllFailed {
                concurrency,
                total_requests,
            } => {
                println!();
                println!(
                    "⚠ All {} requests failed at concurrency {}",
                    total_requests, concurrency
                );
            }
        }
    }

    let sweeping = levels.len() > 1;
    if sweeping && !reports.is_empty() {
        println!();
        println!("{}", render_comparison_table(&reports));
    }

    let Some(document) = results_document(&reports, sweeping)? else {
        println!("✗ No successful requests; nothing saved");
        return Ok(());
    };
    if reports.is_empty() {
        println!("✗ No successful requests at any level");
    }
    write_json(output, &document)
        .with_context(|| format!("saving results to {}", output.display()))?;
    println!();
    println!("✓ Results saved to {}", output.display());

    Ok(())
}

/// What to persist for a run. A sweep always yields a keyed object, empty
/// when every level failed; a single failed level yields nothing.
fn results_document(reports: &[RunReport], sweeping: bool) -> Result<Option<serde_json::Value>> {
    if reports.is_empty() && !sweeping {
        return Ok(None);
    }
    Ok(Some(run_document(reports, sweeping)?))
}

/// A non-2xx answer only warns; an unreachable server aborts the run.
async fn ensure_ready(transport: &dyn InferenceTransport, endpoint: &str) -> Result<()> {
    println!("\nTesting connection to {}...", endpoint);
    match transport.health_check().await {
        Ok(()) => {
            println!("✓ Server is ready");
            Ok(())
        }
        Err(TransportError::Status { status, .. }) => {
            warn!(status, "Health check returned a non-success status");
            println!("⚠ Server returned status {}; continuing", status);
            Ok(())
        }
        Err(e) => Err(InferBurnError::HealthCheck {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

async fn cmd_eval(args: EvalArgs) -> Result<()> {
    let config = EvalConfig {
        dataset: args.dataset,
        endpoint: args.endpoint,
        model: args.model,
        limit: args.limit,
        delay_ms: args.delay_ms,
        timeout_secs: args.timeout_secs,
    };

    println!();
    println!("{:=<70}", "");
    println!("BFCL EVALUATION - REAL DATASET");
    println!("{:=<70}", "");
    println!("  Dataset:   {}", config.dataset.display());
    println!("  Endpoint:  {}", config.endpoint);
    println!("  Model:     {}", config.model);
    println!("  Limit:     {} samples", config.limit);

    let samples = load_dataset(&config.dataset, config.limit)?;
    println!("✓ Loaded {} samples", samples.len());

    let runner = EvaluationRunner::new(CompletionsClient::new(&config.endpoint), &config);
    let report = runner
        .run(&config.dataset.display().to_string(), &samples)
        .await;

    println!();
    println!("{}", render_evaluation_summary(&report));

    write_json(&args.output, &report)
        .with_context(|| format!("saving results to {}", args.output.display()))?;
    println!();
    println!("✓ Detailed results saved to: {}", args.output.display());

    Ok(())
}

async fn cmd_status(endpoint: &str, triton: Option<&str>) -> Result<()> {
    println!("System Status:");
    println!("{:-<40}", "");

    let completions = CompletionsClient::new(endpoint);
    println!("  Completions: {}", completions.base_url());
    match completions.health_check().await {
        Ok(()) => println!("  Completions: ready"),
        Err(e) => println!("  Completions: not ready ({})", e),
    }

    if let Some(url) = triton {
        let triton = TritonClient::new(url);
        println!("  Triton: {}", triton.base_url());
        match triton.health_check().await {
            Ok(()) => println!("  Triton: ready"),
            Err(e) => println!("  Triton: not ready ({})", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn triton_defaults_sweep_five_levels() {
        let cli = Cli::try_parse_from(["inferburn", "triton", "--triton-url", "http://t:8000"]).unwrap();
        let Commands::Triton(args) = cli.command else {
            panic!("expected triton");
        };
        assert_eq!(parse_concurrency_levels(&args.concurrency).unwrap(), vec![1, 8, 16, 24, 32]);
        assert_eq!(args.num_requests, 100);
        assert_eq!(args.output, PathBuf::from("results/triton_performance.json"));
        assert_eq!(args.timeout_secs, 60);
    }

    #[test]
    fn failed_sweep_still_persists_an_empty_object() {
        let doc = results_document(&[], true).unwrap();
        assert_eq!(doc, Some(serde_json::json!({})));

        assert!(results_document(&[], false).unwrap().is_none());

        let report = RunReport::new(1, std::time::Duration::from_secs(1), Default::default());
        let doc = results_document(&[report], false).unwrap().unwrap();
        assert_eq!(doc["concurrency"], 1);
    }

    #[test]
    fn completions_prompts_repeat() {
        let cli = Cli::try_parse_from([
            "inferburn",
            "completions",
            "--endpoint",
            "http://vllm:8000/v1",
            "--prompt",
            "a",
            "--prompt",
            "b",
            "--no-stream",
            "--concurrency",
            "4,8",
        ])
        .unwrap();
        let Commands::Completions(args) = cli.command else {
            panic!("expected completions");
        };
        assert_eq!(args.prompts, vec!["a", "b"]);
        assert!(args.no_stream);
        assert_eq!(args.requests, 32);
        assert_eq!(args.concurrency, "4,8");
    }
}
