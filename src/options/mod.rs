//! Settings page model: prompt table editing, API form, connection test,
//! model discovery and settings import/export.

use chrono::Local;
use log::{ error, info, warn };
use serde::{ Deserialize, Serialize };
use std::sync::Arc;
use url::Url;

use crate::config::settings::SettingsStore;
use crate::config::transfer::{ export_file_name, export_settings, import_settings };
use crate::error::{ HelperError, Result };
use crate::llm::chat::ChatClient;
use crate::models::settings::{
    next_prompt_id,
    Prompt,
    Settings,
    SettingsPatch,
    NEW_PROMPT_NAME,
    NEW_PROMPT_TEXT,
};

pub const CONNECTION_OK: &str = "Connection successful";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptField {
    Name,
    Prompt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedSettings {
    pub file_name: String,
    pub contents: String,
}

pub struct OptionsPage {
    store: SettingsStore,
    client: Arc<dyn ChatClient>,
    settings: Settings,
    original_prompts: Vec<Prompt>,
    unsaved: bool,
    dragging: Option<usize>,
    connection: Option<ConnectionStatus>,
}

impl OptionsPage {
    pub async fn load(store: SettingsStore, client: Arc<dyn ChatClient>) -> Result<Self> {
        let mut page = Self {
            store,
            client,
            settings: Settings::default(),
            original_prompts: Vec::new(),
            unsaved: false,
            dragging: None,
            connection: None,
        };
        page.reload().await?;
        Ok(page)
    }

    /// Replaces the page model with what is stored, discarding unsaved edits.
    pub async fn reload(&mut self) -> Result<()> {
        self.settings = self.store.load().await?;
        self.original_prompts = self.settings.custom_prompts.clone();
        self.unsaved = false;
        self.dragging = None;
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.settings.custom_prompts
    }

    pub fn connection(&self) -> Option<&ConnectionStatus> {
        self.connection.as_ref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn can_save(&self) -> bool {
        self.unsaved
    }

    pub fn confirm_before_leave(&self) -> bool {
        self.unsaved
    }

    /// True when the row differs from the last loaded or saved version.
    pub fn is_modified(&self, id: u32) -> bool {
        let current = self.settings.find_prompt(id);
        let original = self.original_prompts.iter().find(|p| p.id == id);
        current != original
    }

    pub fn add_prompt(&mut self) -> u32 {
        let id = next_prompt_id(&self.settings.custom_prompts);
        self.settings.custom_prompts.push(Prompt {
            id,
            name: NEW_PROMPT_NAME.to_string(),
            prompt: NEW_PROMPT_TEXT.to_string(),
        });
        self.unsaved = true;
        id
    }

    pub fn update_prompt(&mut self, id: u32, field: PromptField, value: &str) -> Result<()> {
        let prompt = self.settings.custom_prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(HelperError::UnknownPrompt(id))?;
        match field {
            PromptField::Name => prompt.name = value.to_string(),
            PromptField::Prompt => prompt.prompt = value.to_string(),
        }
        self.unsaved = true;
        Ok(())
    }

    pub fn delete_prompt(&mut self, id: u32) -> Result<()> {
        let index = self.position_of(id)?;
        self.settings.custom_prompts.remove(index);
        self.unsaved = true;
        Ok(())
    }

    /// Removes the row at `from` and reinserts it at `to`.
    pub fn move_prompt(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.settings.custom_prompts.len();
        if from >= len || to >= len {
            return Err(HelperError::Validation(format!(
                "Cannot move prompt from position {} to {} in a list of {}",
                from,
                to,
                len
            )));
        }
        let prompt = self.settings.custom_prompts.remove(from);
        self.settings.custom_prompts.insert(to, prompt);
        self.unsaved = true;
        Ok(())
    }

    pub fn drag_start(&mut self, index: usize) {
        self.dragging = Some(index);
    }

    /// Completes a drag started with `drag_start`. Dropping on the source row does nothing.
    pub fn drop_at(&mut self, index: usize) -> Result<()> {
        match self.dragging.take() {
            Some(from) if from != index => self.move_prompt(from, index),
            _ => Ok(()),
        }
    }

    pub async fn save_prompts(&mut self) -> Result<()> {
        if let Some(invalid) = self.settings.custom_prompts.iter().find(|p| !p.is_valid()) {
            return Err(HelperError::Validation(format!(
                "Prompt {} needs both a name and prompt text",
                invalid.id
            )));
        }
        self.store.save_prompts(&self.settings.custom_prompts).await?;
        self.original_prompts = self.settings.custom_prompts.clone();
        self.unsaved = false;
        info!("Saved {} prompts", self.settings.custom_prompts.len());
        Ok(())
    }

    pub async fn set_api_key(&mut self, api_key: &str) -> Result<()> {
        self.store.update(&SettingsPatch {
            api_key: Some(api_key.to_string()),
            ..Default::default()
        }).await?;
        self.settings.api_key = api_key.to_string();
        Ok(())
    }

    pub async fn set_api_endpoint(&mut self, endpoint: &str) -> Result<()> {
        if let Err(e) = Url::parse(endpoint.trim()) {
            warn!("API endpoint '{}' does not look like a URL: {}", endpoint, e);
        }
        self.store.update(&SettingsPatch {
            api_endpoint: Some(endpoint.to_string()),
            ..Default::default()
        }).await?;
        self.settings.api_endpoint = endpoint.to_string();
        Ok(())
    }

    pub async fn select_model(&mut self, model: &str) -> Result<()> {
        self.store.update(&SettingsPatch {
            selected_model: Some(model.to_string()),
            ..Default::default()
        }).await?;
        self.settings.selected_model = model.to_string();
        Ok(())
    }

    pub async fn test_connection(&mut self) -> ConnectionStatus {
        let status = match
            self.client.list_models(&self.settings.api_endpoint, &self.settings.api_key).await
        {
            Ok(_) => ConnectionStatus { success: true, message: CONNECTION_OK.to_string() },
            Err(e) => ConnectionStatus { success: false, message: e.to_string() },
        };
        self.connection = Some(status.clone());
        status
    }

    /// Fetches the model list and stores it together with the endpoint it came from.
    pub async fn load_models(&mut self) -> Result<Vec<String>> {
        if self.settings.api_endpoint.trim().is_empty() || self.settings.api_key.trim().is_empty() {
            return Err(HelperError::Validation("Please enter both API endpoint and API key".to_string()));
        }

        let status = self.test_connection().await;
        if !status.success {
            error!("Error loading models: {}", status.message);
            return Err(HelperError::Validation(format!("Connection test failed: {}", status.message)));
        }

        let models = self.client.list_models(&self.settings.api_endpoint, &self.settings.api_key).await?;
        self.store.update(&SettingsPatch {
            available_models: Some(models.clone()),
            api_endpoint: Some(self.settings.api_endpoint.clone()),
            ..Default::default()
        }).await?;
        self.settings.available_models = models.clone();
        info!("Loaded {} models from {}", models.len(), self.settings.api_endpoint);
        Ok(models)
    }

    /// Serializes what is stored, not unsaved edits.
    pub async fn export_settings(&self) -> Result<ExportedSettings> {
        let stored = self.store.load().await?;
        Ok(ExportedSettings {
            file_name: export_file_name(&Local::now()),
            contents: export_settings(&stored)?,
        })
    }

    pub async fn import_settings(&mut self, text: &str) -> Result<()> {
        let imported = import_settings(text)?;
        self.store.replace(imported).await?;
        self.reload().await?;
        info!("Imported settings ({} prompts)", self.settings.custom_prompts.len());
        Ok(())
    }

    fn position_of(&self, id: u32) -> Result<usize> {
        self.settings.custom_prompts
            .iter()
            .position(|p| p.id == id)
            .ok_or(HelperError::UnknownPrompt(id))
    }
}
