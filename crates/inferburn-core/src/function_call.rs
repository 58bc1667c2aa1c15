use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::FunctionDef;

type JsonObject = Map<String, Value>;

/// Single-level `{...}` candidates inside noisy model output.
fn flat_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("static regex"))
}

/// Why a prediction did not count as a correct function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    NoValidJson,
    MissingFunctionName,
    MissingParameters(Vec<String>),
    WrongFunction { expected: Vec<String>, got: String },
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFailure::NoValidJson => write!(f, "No valid JSON found"),
            MatchFailure::MissingFunctionName => write!(f, "No function name in response"),
            MatchFailure::MissingParameters(missing) => {
                write!(f, "Missing required params: {:?}", missing)
            }
            MatchFailure::WrongFunction { expected, got } => write!(
                f,
                "Wrong function. Expected one of: {:?}, got: {}",
                expected, got
            ),
        }
    }
}

pub const MATCH_MESSAGE: &str = "Correct function and parameters";

/// Pull the first JSON object out of `text`.
///
/// Tries, in order: the whole text, each flat `{...}` candidate, then the span
/// from the first `{` to the last `}`. Parses that yield non-objects count as
/// misses.
pub fn extract_json_object(text: &str) -> Option<JsonObject> {
    if let Some(obj) = parse_object(text) {
        return Some(obj);
    }

    if let Some(obj) = flat_object_pattern()
        .find_iter(text)
        .find_map(|m| parse_object(m.as_str()))
    {
        return Some(obj);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    parse_object(&text[start..=end])
}

fn parse_object(candidate: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Lower-case and drop `_`, `.` and `-`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '.' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Check a parsed prediction against the functions the sample allows.
///
/// Only the function name and the presence of required parameters are
/// checked; argument values are not compared.
pub fn evaluate_call(
    predicted: Option<&JsonObject>,
    expected: &[FunctionDef],
) -> Result<(), MatchFailure> {
    let predicted = match predicted {
        Some(p) if !p.is_empty() => p,
        _ => return Err(MatchFailure::NoValidJson),
    };

    let claimed = claimed_function_name(predicted).ok_or(MatchFailure::MissingFunctionName)?;
    let claimed_norm = normalize_name(claimed);

    let Some(function) = expected
        .iter()
        .find(|f| normalize_name(&f.name) == claimed_norm)
    else {
        return Err(MatchFailure::WrongFunction {
            expected: expected.iter().map(|f| f.name.clone()).collect(),
            got: claimed.to_string(),
        });
    };

    let params = claimed_parameters(predicted);
    let present: Vec<String> = params.keys().map(|k| normalize_name(k)).collect();

    let missing: Vec<String> = function
        .parameters
        .required
        .iter()
        .filter(|req| !params.contains_key(req.as_str()))
        .filter(|req| !present.contains(&normalize_name(req)))
        .cloned()
        .collect();

    match missing.is_empty() {
        true => Ok(()),
        false => Err(MatchFailure::MissingParameters(missing)),
    }
}

fn claimed_function_name(predicted: &JsonObject) -> Option<&str> {
    let value = predicted.get("function").or_else(|| predicted.get("name"))?;
    value.as_str().filter(|s| !s.is_empty())
}

fn claimed_parameters(predicted: &JsonObject) -> JsonObject {
    for key in ["parameters", "arguments"] {
        let Some(value) = predicted.get(key) else {
            continue;
        };
        match value {
            Value::Object(obj) if !obj.is_empty() => return obj.clone(),
            // OpenAI-style tool calls carry arguments as an encoded string
            Value::String(encoded) => {
                if let Some(obj) = parse_object(encoded).filter(|o| !o.is_empty()) {
                    return obj;
                }
            }
            _ => {}
        }
    }

    predicted
        .iter()
        .filter(|(k, _)| k.as_str() != "function" && k.as_str() != "name")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
