use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Question id to answer value, owned by the caller.
pub type Answers = BTreeMap<String, Value>;

/// Builds an answers map from a JSON object; anything else yields an empty map.
pub fn answers_from_value(value: &Value) -> Answers {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn answers_to_value(answers: &Answers) -> Value {
    Value::Object(
        answers
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Map<String, Value>>(),
    )
}

/// Context expressions are evaluated against: `{"answers": {...}}`.
pub(crate) fn evaluation_context(answers: &Answers) -> Value {
    let mut ctx = Map::new();
    ctx.insert("answers".into(), answers_to_value(answers));
    Value::Object(ctx)
}

/// One failed answer check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub unknown_fields: Vec<String>,
}
