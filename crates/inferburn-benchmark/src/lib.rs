pub mod completions;
pub mod controller;
pub mod driver;
pub mod evaluation;
pub mod report;
pub mod sweep;
pub mod transport;
pub mod triton;

pub use completions::{CompletionSettings, CompletionsClient, CompletionsTransport};
pub use controller::ConcurrencyController;
pub use driver::RequestDriver;
pub use evaluation::{EvaluationReport, EvaluationRunner, SampleDetail};
pub use report::{
    render_comparison_table, render_evaluation_summary, render_run_summary, run_document, write_json,
};
pub use sweep::{run_level, run_sweep, LevelResult, RunReport};
pub use transport::{InferenceTransport, Reply, TransportError};
pub use triton::{TritonClient, TritonTransport};
