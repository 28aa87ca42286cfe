use chrono::{ DateTime, TimeZone };
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use std::fmt::Display;

use crate::error::{ HelperError, Result };
use crate::models::settings::{ Prompt, Settings };

/// On-disk shape of an exported settings file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsExport {
    pub api_endpoint: String,
    pub api_key: String,
    pub selected_model: String,
    pub available_models: Vec<String>,
    pub custom_prompts: Vec<Prompt>,
}

/// What an imported file may carry. Missing and `null` fields both read as empty;
/// `customPrompts` wins over the older `prompts` key when a file has both.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedFields {
    #[serde(default)]
    api_endpoint: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    selected_model: Option<String>,
    #[serde(default)]
    available_models: Option<Vec<String>>,
    #[serde(default)]
    custom_prompts: Option<Vec<Prompt>>,
    #[serde(default)]
    prompts: Option<Vec<Prompt>>,
}

impl From<ImportedFields> for Settings {
    fn from(fields: ImportedFields) -> Self {
        Self {
            api_key: fields.api_key.unwrap_or_default(),
            api_endpoint: fields.api_endpoint.unwrap_or_default(),
            selected_model: fields.selected_model.unwrap_or_default(),
            available_models: fields.available_models.unwrap_or_default(),
            custom_prompts: fields.custom_prompts.or(fields.prompts).unwrap_or_default(),
        }
    }
}

/// Older export files wrapped the fields in an envelope.
#[derive(Deserialize)]
struct LegacyEnvelope {
    #[serde(default)]
    version: Option<String>,
    settings: ImportedFields,
}

impl From<&Settings> for SettingsExport {
    fn from(settings: &Settings) -> Self {
        Self {
            api_endpoint: settings.api_endpoint.clone(),
            api_key: settings.api_key.clone(),
            selected_model: settings.selected_model.clone(),
            available_models: settings.available_models.clone(),
            custom_prompts: settings.custom_prompts.clone(),
        }
    }
}

pub fn export_settings(settings: &Settings) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SettingsExport::from(settings))?)
}

pub fn export_file_name<Tz>(now: &DateTime<Tz>) -> String
    where Tz: TimeZone, Tz::Offset: Display
{
    format!("gpt_helper_settings_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Parses an exported settings file. Unknown fields are ignored, missing or null ones default to empty.
pub fn import_settings(text: &str) -> Result<Settings> {
    let value: Value = serde_json
        ::from_str(text)
        .map_err(|e| HelperError::Parse(format!("Settings file is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| HelperError::Parse("Invalid file format: expected a JSON object".to_string()))?;

    let fields: ImportedFields = match object.get("settings") {
        Some(Value::Object(_)) => {
            let envelope: LegacyEnvelope = serde_json
                ::from_value(value.clone())
                .map_err(|e| HelperError::Parse(format!("Invalid file format: {}", e)))?;
            log::info!(
                "Importing legacy settings envelope (version {})",
                envelope.version.as_deref().unwrap_or("unknown")
            );
            envelope.settings
        }
        Some(_) => {
            return Err(HelperError::Parse("Invalid file format: 'settings' must be an object".to_string()));
        }
        None => serde_json
            ::from_value(value)
            .map_err(|e| HelperError::Parse(format!("Invalid file format: {}", e)))?,
    };

    Ok(fields.into())
}
