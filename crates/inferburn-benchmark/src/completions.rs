use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use inferburn_core::config::HEALTH_CHECK_TIMEOUT_SECS;
use inferburn_core::RunConfig;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use crate::transport::{truncate_body, InferenceTransport, LineStream, Reply, TransportError};

/// Longest body line accepted from a streaming reply.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Client for an OpenAI-compatible `/v1/completions` server.
#[derive(Debug, Clone)]
pub struct CompletionsClient {
    base_url: String,
    client: reqwest::Client,
}

/// Generation parameters sent with every prompt.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub stop: Vec<String>,
}

impl From<&RunConfig> for CompletionSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: config.stream,
            stop: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

impl CompletionsClient {
    /// Accepts the server root with or without a trailing `/v1`.
    pub fn new(endpoint: &str) -> Self {
        Self {
            base_url: normalize_base_url(endpoint),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/completions", self.base_url)
    }

    async fn post(
        &self,
        settings: &CompletionSettings,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, TransportError> {
        let request = CompletionRequest {
            model: &settings.model,
            prompt,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            stream,
            stop: &settings.stop,
        };

        let resp = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(resp)
    }

    /// Non-streaming completion; returns the first choice's text.
    #[instrument(skip(self, settings, prompt), fields(model = %settings.model))]
    pub async fn complete(
        &self,
        settings: &CompletionSettings,
        prompt: &str,
    ) -> Result<String, TransportError> {
        let resp = self.post(settings, prompt, false).await?;
        let body = resp.text().await?;

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::Decode(format!("{} - Body: {}", e, truncate_body(&body)))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| TransportError::Decode("response contained no choices".to_string()))
    }

    /// Streaming completion; yields the raw body line by line as it arrives.
    #[instrument(skip(self, settings, prompt), fields(model = %settings.model))]
    pub async fn stream_lines(
        &self,
        settings: &CompletionSettings,
        prompt: &str,
    ) -> Result<LineStream, TransportError> {
        let resp = self.post(settings, prompt, true).await?;
        Ok(split_lines(resp.bytes_stream().map_err(std::io::Error::other)))
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health_check(&self) -> Result<(), TransportError> {
        let url = format!("{}/health", self.base_url);
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

/// Load-test adapter binding a client to fixed generation settings.
pub struct CompletionsTransport {
    client: CompletionsClient,
    settings: CompletionSettings,
}

impl CompletionsTransport {
    pub fn new(client: CompletionsClient, settings: CompletionSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl InferenceTransport for CompletionsTransport {
    fn name(&self) -> &'static str {
        "completions"
    }

    async fn send(&self, prompt: &str) -> Result<Reply, TransportError> {
        match self.settings.stream {
            true => Ok(Reply::Incremental(
                self.client.stream_lines(&self.settings, prompt).await?,
            )),
            false => Ok(Reply::Atomic(
                self.client.complete(&self.settings, prompt).await?,
            )),
        }
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        self.client.health_check().await
    }
}

/// Split a chunked body on `\n`. Invalid UTF-8 is replaced rather than
/// rejected, and a line over [`MAX_LINE_BYTES`] ends the stream with an error.
fn split_lines<S>(body: S) -> LineStream
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), MAX_LINE_BYTES);
    FramedRead::new(StreamReader::new(body), codec)
        .map_ok(|line| {
            let line = String::from_utf8_lossy(&line);
            line.strip_suffix('\r').unwrap_or(&*line).to_string()
        })
        .map_err(|e| TransportError::Stream(e.to_string()))
        .boxed()
}

/// Strip trailing `/` and a trailing `/v1` so paths can be appended.
pub fn normalize_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("http://localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
        assert_eq!(normalize_base_url("http://vllm:8000/v1"), "http://vllm:8000");
        assert_eq!(normalize_base_url("http://vllm:8000/v1/"), "http://vllm:8000");
        assert_eq!(normalize_base_url("http://host/v1beta"), "http://host/v1beta");
    }

    #[test]
    fn atomic_request_omits_stream_and_empty_stop() {
        let request = CompletionRequest {
            model: "m",
            prompt: "p",
            max_tokens: 200,
            temperature: 0.7,
            stream: false,
            stop: &[],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stream").is_none());
        assert!(json.get("stop").is_none());
        assert_eq!(json["max_tokens"], 200);
    }

    #[test]
    fn streaming_request_carries_flag_and_stops() {
        let stops = vec!["<|im_end|>".to_string()];
        let request = CompletionRequest {
            model: "m",
            prompt: "p",
            max_tokens: 512,
            temperature: 0.0,
            stream: true,
            stop: &stops,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["stop"][0], "<|im_end|>");
    }

    fn body(chunks: Vec<&'static [u8]>) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
    }

    #[tokio::test]
    async fn lines_survive_invalid_utf8_and_split_chunks() {
        let lines: Vec<String> = split_lines(body(vec![
            b"data: {\"text\": \"\xff\xfe\"}\r\n\nda".as_slice(),
            b"ta: [DONE]\n".as_slice(),
            b"tail".as_slice(),
        ]))
        .try_collect()
        .await
        .unwrap();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "data: {\"text\": \"\u{FFFD}\u{FFFD}\"}");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "data: [DONE]");
        assert_eq!(lines[3], "tail");
    }

    #[tokio::test]
    async fn oversized_line_is_a_stream_error() {
        let huge: &'static [u8] = Box::leak(vec![b'x'; MAX_LINE_BYTES + 1].into_boxed_slice());
        let result: Result<Vec<String>, _> = split_lines(body(vec![huge, b"\n".as_slice()])).try_collect().await;
        assert!(matches!(result, Err(TransportError::Stream(_))));
    }
}
