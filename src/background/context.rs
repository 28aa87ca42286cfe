use log::{ debug, info };
use serde_json::Map;
use tokio::sync::RwLock;

use crate::config::settings::{
    settings_from_items,
    SettingsStore,
    KEY_API_ENDPOINT,
    KEY_API_KEY,
    KEY_AVAILABLE_MODELS,
    KEY_CUSTOM_PROMPTS,
    KEY_SELECTED_MODEL,
    SETTINGS_KEYS,
};
use crate::config::store::{ StorageArea, StorageChange, StoreError };
use crate::models::settings::Settings;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    pub url: String,
}

/// In-memory mirror of the settings plus the last page selection.
#[derive(Default)]
pub struct CoordinatorContext {
    settings: RwLock<Settings>,
    last_selection: RwLock<Option<Selection>>,
}

impl CoordinatorContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            last_selection: RwLock::new(None),
        }
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn reload(&self, store: &SettingsStore) -> Result<Settings, StoreError> {
        let fresh = store.load().await?;
        *self.settings.write().await = fresh.clone();
        debug!("Settings mirror reloaded ({} prompts)", fresh.custom_prompts.len());
        Ok(fresh)
    }

    /// Folds one store change into the mirror. Returns true when the prompt list changed.
    pub async fn apply_change(&self, change: &StorageChange) -> bool {
        if change.area != StorageArea::Sync || !SETTINGS_KEYS.contains(&change.key.as_str()) {
            return false;
        }

        let mut settings = self.settings.write().await;
        let mut items = Map::new();
        if let Some(value) = &change.new_value {
            items.insert(change.key.clone(), value.clone());
        }
        let coerced = settings_from_items(&items);
        match change.key.as_str() {
            KEY_API_KEY => settings.api_key = coerced.api_key,
            KEY_API_ENDPOINT => settings.api_endpoint = coerced.api_endpoint,
            KEY_SELECTED_MODEL => settings.selected_model = coerced.selected_model,
            KEY_AVAILABLE_MODELS => settings.available_models = coerced.available_models,
            KEY_CUSTOM_PROMPTS => {
                settings.custom_prompts = coerced.custom_prompts;
                info!("Prompt list changed ({} prompts)", settings.custom_prompts.len());
                return true;
            }
            _ => {}
        }
        false
    }

    pub async fn remember_selection(&self, selection: Selection) {
        *self.last_selection.write().await = Some(selection);
    }

    pub async fn last_selection(&self) -> Option<Selection> {
        self.last_selection.read().await.clone()
    }
}
