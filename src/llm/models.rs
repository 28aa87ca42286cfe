use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ HelperError, Result };

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OpenAiModel {
    pub id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NamedModel {
    pub name: String,
}

/// The shapes a `/models` endpoint is known to answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelListResponse {
    /// `{ "data": [{ "id": .. }] }`
    OpenAi(Vec<OpenAiModel>),
    /// `{ "models": [{ "name": .. }] }`
    NameArray(Vec<NamedModel>),
    /// `[ "model-a", "model-b" ]`
    Bare(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelListShape {
    OpenAi,
    NameArray,
    Bare,
}

/// Decides which shape a response body has by its top-level structure.
pub fn discriminate(body: &Value) -> Option<ModelListShape> {
    match body {
        Value::Object(map) => {
            if map.get("data").map_or(false, Value::is_array) {
                Some(ModelListShape::OpenAi)
            } else if map.get("models").map_or(false, Value::is_array) {
                Some(ModelListShape::NameArray)
            } else {
                None
            }
        }
        Value::Array(_) => Some(ModelListShape::Bare),
        _ => None,
    }
}

impl ModelListResponse {
    pub fn from_value(body: Value) -> Result<Self> {
        let shape = discriminate(&body).ok_or_else(|| {
            HelperError::Parse("Unexpected model list format".to_string())
        })?;

        let parse_err = |e: serde_json::Error| {
            HelperError::Parse(format!("Malformed model list: {}", e))
        };

        Ok(match (shape, body) {
            (ModelListShape::OpenAi, Value::Object(mut map)) => {
                let data = map.remove("data").unwrap_or(Value::Null);
                ModelListResponse::OpenAi(serde_json::from_value(data).map_err(parse_err)?)
            }
            (ModelListShape::NameArray, Value::Object(mut map)) => {
                let models = map.remove("models").unwrap_or(Value::Null);
                ModelListResponse::NameArray(serde_json::from_value(models).map_err(parse_err)?)
            }
            (ModelListShape::Bare, Value::Array(items)) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(name) => names.push(name),
                        other => warn!("Skipping non-string model entry: {}", other),
                    }
                }
                ModelListResponse::Bare(names)
            }
            _ => {
                return Err(HelperError::Parse("Unexpected model list format".to_string()));
            }
        })
    }

    /// Flat list of model identifiers usable as `selectedModel`.
    pub fn into_model_ids(self) -> Vec<String> {
        match self {
            ModelListResponse::OpenAi(models) => models.into_iter().map(|m| m.id).collect(),
            ModelListResponse::NameArray(models) =>
                models
                    .into_iter()
                    .map(|m| match m.name.strip_prefix("models/") {
                        Some(short) => short.to_string(),
                        None => m.name,
                    })
                    .collect(),
            ModelListResponse::Bare(names) => names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_shape() {
        let body = json!({ "object": "list", "data": [{ "id": "gpt-4o" }, { "id": "gpt-4o-mini" }] });
        let ids = ModelListResponse::from_value(body).unwrap().into_model_ids();
        assert_eq!(ids, vec!["gpt-4o", "gpt-4o-mini"]);
    }

    #[test]
    fn name_array_shape_drops_models_prefix() {
        let body = json!({ "models": [{ "name": "models/gemini-1.5-pro" }, { "name": "local" }] });
        let ids = ModelListResponse::from_value(body).unwrap().into_model_ids();
        assert_eq!(ids, vec!["gemini-1.5-pro", "local"]);
    }

    #[test]
    fn bare_array_shape() {
        let body = json!(["llama3", 7, "mistral"]);
        let parsed = ModelListResponse::from_value(body).unwrap();
        assert_eq!(parsed, ModelListResponse::Bare(vec!["llama3".into(), "mistral".into()]));
    }

    #[test]
    fn data_wins_over_models_when_both_present() {
        let body = json!({ "data": [], "models": [{ "name": "x" }] });
        assert_eq!(discriminate(&body), Some(ModelListShape::OpenAi));
    }

    #[test]
    fn unknown_shapes_are_parse_errors() {
        for body in [json!({ "items": [] }), json!("gpt-4o"), json!({ "data": "x" })] {
            assert!(matches!(ModelListResponse::from_value(body), Err(HelperError::Parse(_))));
        }
    }

    #[test]
    fn malformed_entries_are_parse_errors() {
        let body = json!({ "data": [{ "name": "no id" }] });
        assert!(matches!(ModelListResponse::from_value(body), Err(HelperError::Parse(_))));
    }
}
