pub mod config;
pub mod dataset;
pub mod error;
pub mod function_call;
pub mod metrics;
pub mod outcome;

pub use config::{parse_concurrency_levels, EvalConfig, RunConfig};
pub use dataset::{load_dataset, BfclSample, ChatTurn, FunctionDef, FunctionParameters};
pub use error::{InferBurnError, Result};
pub use function_call::{evaluate_call, extract_json_object, normalize_name, MatchFailure};
pub use metrics::{reduce, AggregateMetrics, LatencyStats, Reduction};
pub use outcome::{OutcomeStatus, RequestOutcome};
