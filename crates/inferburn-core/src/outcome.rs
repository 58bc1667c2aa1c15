use std::time::Duration;

/// Result of one inference attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// Submission index, not completion order.
    pub request_id: usize,
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Succeeded {
        first_output_latency: Duration,
        total_latency: Duration,
        output_count: usize,
    },
    Failed {
        reason: String,
    },
}

impl RequestOutcome {
    pub fn success(
        request_id: usize,
        first_output_latency: Option<Duration>,
        total_latency: Duration,
        output_count: usize,
    ) -> Self {
        Self {
            request_id,
            status: OutcomeStatus::Succeeded {
                first_output_latency: first_output_latency.unwrap_or(total_latency),
                total_latency,
                output_count,
            },
        }
    }

    pub fn failure(request_id: usize, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            status: OutcomeStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    pub fn first_output_latency(&self) -> Option<Duration> {
        match &self.status {
            OutcomeStatus::Succeeded {
                first_output_latency,
                ..
            } => Some(*first_output_latency),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn total_latency(&self) -> Option<Duration> {
        match &self.status {
            OutcomeStatus::Succeeded { total_latency, .. } => Some(*total_latency),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn output_count(&self) -> usize {
        match &self.status {
            OutcomeStatus::Succeeded { output_count, .. } => *output_count,
            OutcomeStatus::Failed { .. } => 0,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Succeeded { .. } => None,
            OutcomeStatus::Failed { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_without_first_output_defaults_to_total() {
        let outcome = RequestOutcome::success(3, None, Duration::from_millis(250), 12);
        assert_eq!(outcome.first_output_latency(), Some(Duration::from_millis(250)));
        assert_eq!(outcome.total_latency(), Some(Duration::from_millis(250)));
        assert_eq!(outcome.output_count(), 12);
        assert!(outcome.failure_reason().is_none());
    }

    #[test]
    fn failure_carries_reason_only() {
        let outcome = RequestOutcome::failure(7, "timeout");
        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_reason(), Some("timeout"));
        assert!(outcome.total_latency().is_none());
        assert!(outcome.first_output_latency().is_none());
        assert_eq!(outcome.output_count(), 0);
    }
}
