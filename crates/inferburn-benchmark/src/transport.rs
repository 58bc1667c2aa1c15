use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Failure of a single inference call. Always folded into a `RequestOutcome`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return TransportError::Timeout;
        }
        if e.is_connect() {
            return TransportError::Connect(e.to_string());
        }
        if e.is_decode() {
            return TransportError::Decode(e.to_string());
        }
        TransportError::Request(e.to_string())
    }
}

pub type LineStream = BoxStream<'static, Result<String, TransportError>>;

/// What a transport hands back once the request has been accepted.
pub enum Reply {
    /// Output arrives progressively, one line per item.
    Incremental(LineStream),
    /// The complete generated text in one response.
    Atomic(String),
}

#[async_trait]
pub trait InferenceTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, prompt: &str) -> Result<Reply, TransportError>;

    async fn health_check(&self) -> Result<(), TransportError>;
}

/// Keep error bodies short enough for logs and reports.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(500).collect()
}
