use std::sync::Arc;

use inferburn_core::{RequestOutcome, RunConfig};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::driver::RequestDriver;

/// Fans out `total_requests` drivers with at most `concurrency` in flight.
pub struct ConcurrencyController {
    driver: RequestDriver,
}

impl ConcurrencyController {
    pub fn new(driver: RequestDriver) -> Self {
        Self { driver }
    }

    /// Run every request to completion or failure and return one outcome per
    /// request id. No request is retried.
    pub async fn run(&self, config: &RunConfig) -> inferburn_core::Result<Vec<RequestOutcome>> {
        config.validate()?;

        let slots = config.effective_concurrency();
        info!(
            total = config.total_requests,
            concurrency = slots,
            transport = self.driver.transport().name(),
            "Dispatching requests"
        );

        let gate = Arc::new(Semaphore::new(slots));
        let mut outcomes = Vec::with_capacity(config.total_requests);
        let mut handles = Vec::with_capacity(config.total_requests);

        for request_id in 0..config.total_requests {
            // Acquiring here rather than inside the task keeps admission FIFO.
            let permit = match gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    outcomes.push(RequestOutcome::failure(request_id, e.to_string()));
                    continue;
                }
            };

            let driver = self.driver.clone();
            let prompt = config.prompt_for(request_id).to_string();
            let handle = tokio::spawn(async move {
                let outcome = driver.drive(request_id, &prompt).await;
                drop(permit);
                outcome
            });
            handles.push((request_id, handle));
        }

        for (request_id, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(request_id, "Request task aborted: {}", e);
                    outcomes.push(RequestOutcome::failure(
                        request_id,
                        format!("task aborted: {}", e),
                    ));
                }
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        debug!(succeeded, failed = outcomes.len() - succeeded, "All requests settled");

        Ok(outcomes)
    }
}
