use std::path::PathBuf;
use std::time::Duration;

use crate::{InferBurnError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "/models/merged-qwen25-7b-finetuned";
pub const DEFAULT_TRITON_MODEL: &str = "qwen-function-calling";

pub const DEFAULT_PROMPT: &str =
    "What is function calling? Explain how to use LLMs for API calls.";

/// Ceiling for a streamed or atomic completion call.
pub const COMPLETIONS_TIMEOUT_SECS: u64 = 120;
pub const TRITON_TIMEOUT_SECS: u64 = 60;
pub const EVAL_TIMEOUT_SECS: u64 = 30;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Prompt pool used by the Triton load test when none is supplied.
pub const FUNCTION_CALL_PROMPTS: &[&str] = &[
    "Call the get_weather function for San Francisco",
    "Execute get_stock_price for AAPL ticker",
    "Call send_email with recipient john@example.com and subject 'Meeting'",
    "Run calculate_tax for income 75000 and state CA",
    "Execute create_invoice with customer_id 12345 and amount 599.99",
    "Call search_database for query 'recent transactions'",
    "Run validate_transaction with transaction_id tx_98765",
    "Execute get_user_info for user_id 5432",
    "Call process_payment with amount 299.50 and currency USD",
    "Run generate_report for date_range last_30_days",
];

/// Immutable input to one load-test run at a single concurrency level.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoint: String,
    pub model: String,
    pub total_requests: usize,
    pub concurrency: usize,
    pub prompts: Vec<String>,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            total_requests: 32,
            concurrency: 16,
            prompts: vec![DEFAULT_PROMPT.to_string()],
            stream: true,
            max_tokens: 200,
            temperature: 0.7,
            timeout_secs: COMPLETIONS_TIMEOUT_SECS,
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Copy of this configuration at another concurrency level.
    pub fn with_concurrency(&self, concurrency: usize) -> Self {
        Self {
            concurrency,
            ..self.clone()
        }
    }

    /// Prompt assigned to `request_id`, cycling through the pool.
    pub fn prompt_for(&self, request_id: usize) -> &str {
        &self.prompts[request_id % self.prompts.len()]
    }

    /// Number of drivers the controller may keep in flight.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.min(self.total_requests)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_requests == 0 {
            return Err(InferBurnError::Config(
                "total request count must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(InferBurnError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.prompts.is_empty() {
            return Err(InferBurnError::Config(
                "at least one prompt is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Input to a function-calling evaluation pass.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub dataset: PathBuf,
    pub endpoint: String,
    pub model: String,
    pub limit: usize,
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/bfcl_simple_parsed.json"),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            limit: 100,
            delay_ms: 50,
            timeout_secs: EVAL_TIMEOUT_SECS,
        }
    }
}

impl EvalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Parse a comma-separated concurrency list such as `"1,8, 16"`.
pub fn parse_concurrency_levels(input: &str) -> Result<Vec<usize>> {
    let levels = input
        .split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<usize>() {
                Ok(0) => Err(InferBurnError::Config(
                    "concurrency levels must be at least 1".to_string(),
                )),
                Ok(level) => Ok(level),
                Err(_) => Err(InferBurnError::Config(format!(
                    "invalid concurrency level: '{}'",
                    part
                ))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(levels)
}
