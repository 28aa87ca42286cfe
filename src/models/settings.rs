use serde::{ Deserialize, Serialize };

pub const NEW_PROMPT_NAME: &str = "New Prompt";
pub const NEW_PROMPT_TEXT: &str = "Enter your prompt here";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: u32,
    pub name: String,
    pub prompt: String,
}

impl Prompt {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.prompt.trim().is_empty()
    }
}

/// Next free prompt id: one past the current maximum, 1 for an empty list.
pub fn next_prompt_id(prompts: &[Prompt]) -> u32 {
    prompts
        .iter()
        .map(|p| p.id)
        .max()
        .map_or(1, |max| max + 1)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_endpoint: String,
    #[serde(default)]
    pub selected_model: String,
    #[serde(default)]
    pub available_models: Vec<String>,
    #[serde(default)]
    pub custom_prompts: Vec<Prompt>,
}

impl Settings {
    /// Names of the required fields that are still empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() {
            missing.push("apiKey");
        }
        if self.api_endpoint.trim().is_empty() {
            missing.push("apiEndpoint");
        }
        if self.selected_model.trim().is_empty() {
            missing.push("selectedModel");
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn find_prompt(&self, id: u32) -> Option<&Prompt> {
        self.custom_prompts.iter().find(|p| p.id == id)
    }
}

/// Partial settings write. Only `Some` fields reach the store.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompts: Option<Vec<Prompt>>,
}

impl From<Settings> for SettingsPatch {
    fn from(settings: Settings) -> Self {
        Self {
            api_key: Some(settings.api_key),
            api_endpoint: Some(settings.api_endpoint),
            selected_model: Some(settings.selected_model),
            available_models: Some(settings.available_models),
            custom_prompts: Some(settings.custom_prompts),
        }
    }
}

/// Local, per-device UI preferences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_overlay_enabled")]
    pub overlay_enabled: bool,
}

fn default_overlay_enabled() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self { overlay_enabled: default_overlay_enabled() }
    }
}
