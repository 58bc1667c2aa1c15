use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use inferburn_core::RequestOutcome;
use tracing::{debug, warn};

use crate::transport::{InferenceTransport, Reply, TransportError};

/// Issues one inference call and turns whatever happens into a `RequestOutcome`.
#[derive(Clone)]
pub struct RequestDriver {
    transport: Arc<dyn InferenceTransport>,
    timeout: Duration,
}

struct Observation {
    first_output: Option<Duration>,
    total: Duration,
    output_count: usize,
}

impl RequestDriver {
    pub fn new(transport: Arc<dyn InferenceTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &Arc<dyn InferenceTransport> {
        &self.transport
    }

    pub async fn drive(&self, request_id: usize, prompt: &str) -> RequestOutcome {
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.observe(start, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match result {
            Ok(obs) => {
                debug!(
                    request_id,
                    units = obs.output_count,
                    "✓ Request {}: {:.0}ms",
                    request_id,
                    obs.total.as_secs_f64() * 1000.0
                );
                RequestOutcome::success(request_id, obs.first_output, obs.total, obs.output_count)
            }
            Err(e) => {
                warn!(request_id, transport = self.transport.name(), "✗ Request {} failed: {}", request_id, e);
                RequestOutcome::failure(request_id, e.to_string())
            }
        }
    }

    async fn observe(&self, start: Instant, prompt: &str) -> Result<Observation, TransportError> {
        match self.transport.send(prompt).await? {
            Reply::Atomic(text) => Ok(Observation {
                first_output: None,
                total: start.elapsed(),
                output_count: approximate_token_count(&text),
            }),
            Reply::Incremental(mut lines) => {
                let mut first_output = None;
                let mut output_count = 0;

                while let Some(line) = lines.next().await {
                    // SSE separators and keep-alives carry no output
                    if line?.trim().is_empty() {
                        continue;
                    }
                    first_output.get_or_insert_with(|| start.elapsed());
                    output_count += 1;
                }

                Ok(Observation {
                    first_output,
                    total: start.elapsed(),
                    output_count,
                })
            }
        }
    }
}

/// Whitespace-delimited word count. A rough stand-in for a tokenizer when
/// the server returns the whole completion at once.
pub fn approximate_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
