use std::time::Duration;

use inferburn_core::function_call::MATCH_MESSAGE;
use inferburn_core::{evaluate_call, extract_json_object, BfclSample, EvalConfig, FunctionDef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::completions::{CompletionSettings, CompletionsClient};
use crate::transport::TransportError;

const EVAL_MAX_TOKENS: u32 = 512;
const EVAL_STOP: [&str; 3] = ["<|im_end|>", "<|endoftext|>", "\n\n\n"];

/// Scored result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub dataset: String,
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub errors: usize,
    pub details: Vec<SampleDetail>,
    pub accuracy: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleDetail {
    Evaluated {
        id: String,
        question: String,
        expected_functions: Vec<String>,
        predicted_response: String,
        parsed: Map<String, Value>,
        correct: bool,
        message: String,
    },
    Error {
        id: String,
        question: String,
        error: String,
        status: String,
    },
}

impl EvaluationReport {
    pub fn new(dataset: impl Into<String>, total: usize) -> Self {
        Self {
            dataset: dataset.into(),
            total,
            ..Self::default()
        }
    }

    /// Score a model reply against the allowed functions and append its detail.
    pub fn record_reply(
        &mut self,
        id: String,
        question: &str,
        functions: &[FunctionDef],
        reply: &str,
    ) -> bool {
        let parsed = extract_json_object(reply);
        let verdict = evaluate_call(parsed.as_ref(), functions);
        let correct = verdict.is_ok();

        match correct {
            true => self.correct += 1,
            false => self.incorrect += 1,
        }

        self.details.push(SampleDetail::Evaluated {
            id,
            question: question.to_string(),
            expected_functions: functions.iter().map(|f| f.name.clone()).collect(),
            predicted_response: reply.to_string(),
            parsed: parsed.unwrap_or_default(),
            correct,
            message: match verdict {
                Ok(()) => MATCH_MESSAGE.to_string(),
                Err(failure) => failure.to_string(),
            },
        });
        correct
    }

    pub fn record_api_error(&mut self, id: String, question: &str, error: String) {
        self.errors += 1;
        self.details.push(SampleDetail::Error {
            id,
            question: question.to_string(),
            error,
            status: "error".to_string(),
        });
    }

    /// Sample that could not be sent at all; counted but not detailed.
    pub fn record_skipped(&mut self) {
        self.errors += 1;
    }

    pub fn finalize(&mut self) {
        (self.accuracy, self.success_rate) = match self.total {
            0 => (0.0, 0.0),
            total => (
                self.correct as f64 / total as f64,
                (self.correct + self.incorrect) as f64 / total as f64,
            ),
        };
    }
}

/// Sequential function-calling evaluation against a completions server.
pub struct EvaluationRunner {
    client: CompletionsClient,
    settings: CompletionSettings,
    timeout: Duration,
    delay: Duration,
}

impl EvaluationRunner {
    pub fn new(client: CompletionsClient, config: &EvalConfig) -> Self {
        Self {
            client,
            settings: CompletionSettings {
                model: config.model.clone(),
                max_tokens: EVAL_MAX_TOKENS,
                temperature: 0.0,
                stream: false,
                stop: EVAL_STOP.iter().map(|s| s.to_string()).collect(),
            },
            timeout: config.timeout(),
            delay: config.delay(),
        }
    }

    #[instrument(skip(self, samples), fields(count = samples.len()))]
    pub async fn run(&self, dataset: &str, samples: &[BfclSample]) -> EvaluationReport {
        let mut report = EvaluationReport::new(dataset, samples.len());
        let n = samples.len();
        info!("Evaluating {} samples", n);

        for (i, sample) in samples.iter().enumerate() {
            let Some(question) = sample.question_text() else {
                warn!("[{}/{}] ✗ No question", i + 1, n);
                report.record_skipped();
                continue;
            };
            if sample.function.is_empty() {
                warn!("[{}/{}] ✗ No functions", i + 1, n);
                report.record_skipped();
                continue;
            }

            let id = sample.id_or(i);
            match self.ask(question, &sample.function).await {
                Ok(reply) => {
                    let correct = report.record_reply(id, question, &sample.function, &reply);
                    info!("[{}/{}] {}", i + 1, n, if correct { "✓" } else { "✗" });
                }
                Err(e) => {
                    warn!("[{}/{}] ✗ API Error: {}", i + 1, n, e);
                    report.record_api_error(id, question, e.to_string());
                    continue;
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        report.finalize();
        report
    }

    async fn ask(&self, question: &str, functions: &[FunctionDef]) -> Result<String, TransportError> {
        let prompt = build_prompt(question, functions);
        debug!(chars = prompt.len(), "Sending evaluation prompt");

        match tokio::time::timeout(self.timeout, self.client.complete(&self.settings, &prompt)).await {
            Ok(reply) => Ok(reply?.trim().to_string()),
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

/// Render function definitions as a readable list for the prompt.
pub fn format_functions(functions: &[FunctionDef]) -> String {
    functions
        .iter()
        .map(|func| {
            let mut entry = format!(
                "{}: {}",
                func.name,
                func.description.as_deref().unwrap_or("No description")
            );
            for (name, kind, desc) in func.parameter_docs() {
                entry.push_str(&format!("\n  - {} ({}): {}", name, kind, desc));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Qwen chat-template prompt asking for a bare JSON function call.
pub fn build_prompt(question: &str, functions: &[FunctionDef]) -> String {
    format!(
        "<|im_start|>system\n\
You are a helpful assistant that can call functions. When asked to perform a task, respond with a JSON function call in this format:\n\
{{\"function\": \"function_name\", \"param1\": value1, \"param2\": value2}}\n\
\n\
Only respond with the JSON, nothing else.<|im_end|>\n\
<|im_start|>user\n\
Available functions:\n\
\n\
{}\n\
\n\
User request: {}\n\
\n\
Respond with the function call in JSON format.<|im_end|>\n\
<|im_start|>assistant\n",
        format_functions(functions),
        question
    )
}
