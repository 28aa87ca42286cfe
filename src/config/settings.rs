use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{ Map, Value };
use std::sync::Arc;
use tokio::sync::broadcast;

use super::store::{ KeyValueStore, StorageArea, StorageChange, StoreError };
use crate::models::settings::{ Preferences, Prompt, Settings, SettingsPatch };

pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_API_ENDPOINT: &str = "apiEndpoint";
pub const KEY_SELECTED_MODEL: &str = "selectedModel";
pub const KEY_AVAILABLE_MODELS: &str = "availableModels";
pub const KEY_CUSTOM_PROMPTS: &str = "customPrompts";
pub const KEY_OVERLAY_ENABLED: &str = "overlayEnabled";

pub const SETTINGS_KEYS: [&str; 5] = [
    KEY_API_KEY,
    KEY_API_ENDPOINT,
    KEY_SELECTED_MODEL,
    KEY_AVAILABLE_MODELS,
    KEY_CUSTOM_PROMPTS,
];

/// Typed view over the synced area plus local UI preferences.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    pub async fn load(&self) -> Result<Settings, StoreError> {
        let items = self.backend.get(StorageArea::Sync, &SETTINGS_KEYS).await?;
        Ok(settings_from_items(&items))
    }

    pub async fn update(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        let items = match serde_json::to_value(patch) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if items.is_empty() {
            return Ok(());
        }
        self.backend.set(StorageArea::Sync, items).await
    }

    /// Overwrites every settings field.
    pub async fn replace(&self, settings: Settings) -> Result<(), StoreError> {
        self.update(&SettingsPatch::from(settings)).await
    }

    pub async fn save_prompts(&self, prompts: &[Prompt]) -> Result<(), StoreError> {
        self.update(&SettingsPatch {
            custom_prompts: Some(prompts.to_vec()),
            ..Default::default()
        }).await
    }

    pub async fn load_preferences(&self) -> Result<Preferences, StoreError> {
        let items = self.backend.get(StorageArea::Local, &[KEY_OVERLAY_ENABLED]).await?;
        Ok(Preferences {
            overlay_enabled: items
                .get(KEY_OVERLAY_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or_else(|| Preferences::default().overlay_enabled),
        })
    }

    pub async fn save_preferences(&self, preferences: &Preferences) -> Result<(), StoreError> {
        let mut items = Map::new();
        items.insert(KEY_OVERLAY_ENABLED.to_string(), Value::Bool(preferences.overlay_enabled));
        self.backend.set(StorageArea::Local, items).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.backend.subscribe()
    }
}

/// Reads raw store items into `Settings`, defaulting anything absent or of the wrong type.
pub fn settings_from_items(items: &Map<String, Value>) -> Settings {
    Settings {
        api_key: string_or_default(items, KEY_API_KEY),
        api_endpoint: string_or_default(items, KEY_API_ENDPOINT),
        selected_model: string_or_default(items, KEY_SELECTED_MODEL),
        available_models: list_or_default(items, KEY_AVAILABLE_MODELS),
        custom_prompts: list_or_default(items, KEY_CUSTOM_PROMPTS),
    }
}

pub(crate) fn string_or_default(items: &Map<String, Value>, key: &str) -> String {
    items.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub(crate) fn list_or_default<T: DeserializeOwned>(items: &Map<String, Value>, key: &str) -> Vec<T> {
    match items.get(key) {
        Some(value @ Value::Array(_)) =>
            serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!("Ignoring malformed '{}' in settings: {}", key, e);
                Vec::new()
            }),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            warn!("Ignoring non-list '{}' in settings", key);
            Vec::new()
        }
    }
}
