pub mod chat;
pub mod models;

use crate::models::settings::Settings;

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/models";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Connection details for one completion call, taken from the current settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl From<&Settings> for ApiConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            endpoint: settings.api_endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.selected_model.clone(),
        }
    }
}

/// Reduces a configured endpoint to its base: no surrounding whitespace, no trailing
/// slashes, no trailing `/chat/completions` and no trailing `/v1`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let mut base = endpoint.trim().trim_end_matches('/');
    if let Some(stripped) = base.strip_suffix("/chat/completions") {
        base = stripped.trim_end_matches('/');
    }
    if let Some(stripped) = base.strip_suffix("/v1") {
        base = stripped.trim_end_matches('/');
    }
    base.to_string()
}

pub fn build_completion_url(endpoint: &str) -> String {
    format!("{}{}", normalize_endpoint(endpoint), COMPLETIONS_PATH)
}

pub fn build_models_url(endpoint: &str) -> String {
    format!("{}{}", endpoint.trim().trim_end_matches('/'), MODELS_PATH)
}
