use std::time::Duration;

use async_trait::async_trait;
use inferburn_core::config::HEALTH_CHECK_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::completions::normalize_base_url;
use crate::transport::{truncate_body, InferenceTransport, Reply, TransportError};

/// Client for the KServe v2 HTTP inference protocol served by Triton.
#[derive(Debug, Clone)]
pub struct TritonClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InferRequest {
    inputs: Vec<InferTensor>,
}

#[derive(Debug, Serialize)]
struct InferTensor {
    name: &'static str,
    shape: Vec<usize>,
    datatype: &'static str,
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    #[serde(default)]
    outputs: Vec<OutputTensor>,
}

#[derive(Debug, Deserialize)]
struct OutputTensor {
    #[serde(default)]
    data: Vec<Value>,
}

impl TritonClient {
    pub fn new(url: &str) -> Self {
        Self {
            base_url: normalize_base_url(url),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one generation; returns the first element of the first output tensor.
    #[instrument(skip(self, model, prompt), fields(model = %model))]
    pub async fn infer(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, TransportError> {
        let url = format!("{}/v2/models/{}/infer", self.base_url, model);
        let request = InferRequest {
            inputs: vec![
                InferTensor {
                    name: "prompt",
                    shape: vec![1],
                    datatype: "BYTES",
                    data: vec![Value::from(prompt)],
                },
                InferTensor {
                    name: "max_tokens",
                    shape: vec![1],
                    datatype: "INT32",
                    data: vec![Value::from(max_tokens)],
                },
            ],
        };

        let resp = self.client.post(&url).json(&request).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let body = resp.text().await?;
        let parsed: InferResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::Decode(format!("{} - Body: {}", e, truncate_body(&body)))
        })?;

        let text = parsed
            .outputs
            .into_iter()
            .next()
            .and_then(|out| out.data.into_iter().next())
            .map(|value| match value {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default();

        Ok(text)
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health_check(&self) -> Result<(), TransportError> {
        let url = format!("{}/v2/health/ready", self.base_url);
        debug!("Checking {}", url);

        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TransportError::Status {
                status: resp.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

/// Load-test adapter; Triton replies are always atomic.
pub struct TritonTransport {
    client: TritonClient,
    model: String,
    max_tokens: u32,
}

impl TritonTransport {
    pub fn new(client: TritonClient, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl InferenceTransport for TritonTransport {
    fn name(&self) -> &'static str {
        "triton"
    }

    async fn send(&self, prompt: &str) -> Result<Reply, TransportError> {
        let text = self.client.infer(&self.model, prompt, self.max_tokens).await?;
        Ok(Reply::Atomic(text))
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        self.client.health_check().await
    }
}
