//! Record contract for collections.
//!
//! Records are strongly typed. Callers holding loosely-typed maps (JSON
//! objects from a tool call, for example) go through [`Record::from_fields`],
//! which checks a fixed, ordered list of field names for the key and vector.

use docrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names recognized as the record key, in priority order.
pub const KEY_FIELDS: [&str; 3] = ["id", "key", "Key"];

/// Field names recognized as the record vector, in priority order.
pub const VECTOR_FIELDS: [&str; 3] = ["embedding", "vector", "Embedding"];

/// Field names recognized as the text payload, in priority order.
pub const CONTENT_FIELDS: [&str; 3] = ["content", "text", "Content"];

/// Field names recognized as the source identifier, in priority order.
pub const SOURCE_FIELDS: [&str; 3] = ["sourceId", "source_id", "SourceId"];

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique key within a collection
    pub key: String,

    /// Text payload
    pub content: String,

    /// Where the content came from
    pub source_id: String,

    /// Dense vector; records without one are never returned by search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl Record {
    /// Create a record without a vector.
    pub fn new(
        key: impl Into<String>,
        content: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
            source_id: source_id.into(),
            vector: None,
        }
    }

    /// Attach a vector.
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Build a record from a loosely-typed field map.
    ///
    /// The first present, non-null field from [`KEY_FIELDS`] wins; string
    /// and integer keys are accepted. The vector is taken the same way from
    /// [`VECTOR_FIELDS`] and must be an array of numbers. A missing key is a
    /// [`AppError::KeyExtraction`].
    pub fn from_fields(fields: &Map<String, Value>) -> AppResult<Self> {
        let key = match first_present(fields, &KEY_FIELDS) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(other) => {
                return Err(AppError::KeyExtraction(format!(
                    "key field must be a string or integer, got {}",
                    other
                )))
            }
            None => {
                return Err(AppError::KeyExtraction(format!(
                    "none of the fields {:?} is present",
                    KEY_FIELDS
                )))
            }
        };

        let vector = match first_present(fields, &VECTOR_FIELDS) {
            Some(value) => Some(parse_vector(value)?),
            None => None,
        };

        let content = first_present(fields, &CONTENT_FIELDS)
            .map(value_to_text)
            .unwrap_or_default();
        let source_id = first_present(fields, &SOURCE_FIELDS)
            .map(value_to_text)
            .unwrap_or_default();

        Ok(Self {
            key,
            content,
            source_id,
            vector,
        })
    }
}

fn first_present<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|value| !value.is_null())
}

fn parse_vector(value: &Value) -> AppResult<Vec<f32>> {
    let items = value.as_array().ok_or_else(|| {
        AppError::Serialization(format!("vector field must be an array, got {}", value))
    })?;

    items
        .iter()
        .map(|item| {
            item.as_f64().map(|f| f as f32).ok_or_else(|| {
                AppError::Serialization(format!("vector element is not a number: {}", item))
            })
        })
        .collect()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
