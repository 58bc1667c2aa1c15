use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{InferBurnError, Result};

/// One BFCL-style benchmark sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BfclSample {
    #[serde(default)]
    pub id: Option<String>,
    /// Conversation turns, nested per round.
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: Vec<Vec<ChatTurn>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub function: Vec<FunctionDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatTurn {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: FunctionParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: Vec<String>,
}

/// Read an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl BfclSample {
    /// Decode one array element. An element that does not fit the sample
    /// shape becomes an empty sample, keeping its id when it has one.
    fn from_element(index: usize, value: Value) -> Self {
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);
        serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(index, error = %e, "Unreadable dataset sample; it will be skipped");
            Self {
                id,
                ..Self::default()
            }
        })
    }

    /// Content of the first turn of the first round, if non-empty.
    pub fn question_text(&self) -> Option<&str> {
        self.question
            .first()
            .and_then(|round| round.first())
            .map(|turn| turn.content.as_str())
            .filter(|content| !content.is_empty())
    }

    pub fn id_or(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("sample_{}", index))
    }
}

impl FunctionDef {
    /// `(name, type, description)` for each declared parameter.
    pub fn parameter_docs(&self) -> Vec<(&str, &str, &str)> {
        self.parameters
            .properties
            .iter()
            .map(|(name, info)| {
                let kind = info.get("type").and_then(Value::as_str).unwrap_or("any");
                let desc = info
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                (name.as_str(), kind, desc)
            })
            .collect()
    }
}

/// Load a JSON array of samples, keeping at most `limit`. The file must be
/// an array; elements that cannot be read are kept as empty samples.
pub fn load_dataset(path: &Path, limit: usize) -> Result<Vec<BfclSample>> {
    if !path.exists() {
        return Err(InferBurnError::DatasetNotFound(path.to_path_buf()));
    }

    info!("Loading dataset from {}", path.display());
    let raw = std::fs::read_to_string(path)?;
    let mut elements: Vec<Value> = serde_json::from_str(&raw)
        .map_err(|e| InferBurnError::Dataset(format!("{}: {}", path.display(), e)))?;

    elements.truncate(limit);
    let samples: Vec<BfclSample> = elements
        .into_iter()
        .enumerate()
        .map(|(index, value)| BfclSample::from_element(index, value))
        .collect();
    info!(count = samples.len(), "Loaded dataset samples");
    Ok(samples)
}
