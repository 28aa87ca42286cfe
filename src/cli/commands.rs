use log::info;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use super::{ Args, Command, PromptCommand, SettingsCommand };
use crate::background::menus::{ MenuAction, MenuRegistry };
use crate::background::Coordinator;
use crate::config::initialize_store;
use crate::config::settings::SettingsStore;
use crate::error::HelperError;
use crate::llm::chat::new_client;
use crate::models::settings::Settings;
use crate::options::{ OptionsPage, PromptField };
use crate::terminal::TerminalPage;

type CliResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Runs every subcommand except `serve`.
pub async fn execute(args: &Args, command: Command) -> CliResult {
    let backend = initialize_store(&args.data_dir).await?;
    let client = new_client()?;

    match command {
        Command::Serve => Err("serve is handled by the server entry point".into()),
        Command::Ask { prompt_id, prompt, text } => {
            let coordinator = Coordinator::start(backend, client, Arc::new(MenuRegistry::new())).await?;
            let page = TerminalPage::new();
            let text = text.join(" ");

            let result = match (prompt_id, prompt) {
                (_, Some(prompt_text)) => {
                    coordinator.handle_selection_action(&text, &prompt_text, &page).await
                }
                (Some(id), None) => {
                    coordinator.handle_menu_click(&MenuAction::Prompt(id).item_id(), Some(&text), &page).await
                }
                (None, None) => {
                    coordinator.handle_menu_click(&MenuAction::AdHoc.item_id(), Some(&text), &page).await
                }
            };
            result?;
            page.run_session(&coordinator).await?;
            Ok(())
        }
        Command::Prompts { command } => {
            let mut page = OptionsPage::load(SettingsStore::new(backend), client).await?;
            prompts(&mut page, command).await
        }
        Command::Settings { command } => {
            let mut page = OptionsPage::load(SettingsStore::new(backend), client).await?;
            match command {
                SettingsCommand::Show => {
                    print_settings(page.settings());
                }
                SettingsCommand::Set { api_key, api_endpoint, model } => {
                    if let Some(api_key) = api_key {
                        page.set_api_key(&api_key).await?;
                    }
                    if let Some(endpoint) = api_endpoint {
                        page.set_api_endpoint(&endpoint).await?;
                    }
                    if let Some(model) = model {
                        page.select_model(&model).await?;
                    }
                    print_settings(page.settings());
                }
            }
            Ok(())
        }
        Command::Models => {
            let mut page = OptionsPage::load(SettingsStore::new(backend), client).await?;
            let models = page.load_models().await?;
            let selected = page.settings().selected_model.clone();
            for model in models {
                let marker = if model == selected { "*" } else { " " };
                println!("{} {}", marker, model);
            }
            Ok(())
        }
        Command::TestConnection => {
            let mut page = OptionsPage::load(SettingsStore::new(backend), client).await?;
            let status = page.test_connection().await;
            println!("{}", status.message);
            if status.success {
                Ok(())
            } else {
                Err(status.message.into())
            }
        }
        Command::Export { output } => {
            let page = OptionsPage::load(SettingsStore::new(backend), client).await?;
            let exported = page.export_settings().await?;
            let path = output.unwrap_or_else(|| exported.file_name.clone().into());
            tokio::fs::write(&path, exported.contents).await?;
            info!("Settings exported to {}", path.display());
            println!("{}", path.display());
            Ok(())
        }
        Command::Import { path } => {
            if !has_json_extension(&path) {
                return Err(HelperError::Validation("Please select a valid JSON file.".to_string()).into());
            }
            let text = tokio::fs::read_to_string(&path).await?;
            let mut page = OptionsPage::load(SettingsStore::new(backend), client).await?;
            page.import_settings(&text).await?;
            println!("Settings imported successfully ({} prompts)", page.prompts().len());
            Ok(())
        }
    }
}

async fn prompts(page: &mut OptionsPage, command: PromptCommand) -> CliResult {
    match command {
        PromptCommand::List => {
            if page.prompts().is_empty() {
                println!("No prompts configured");
            }
            for (position, prompt) in page.prompts().iter().enumerate() {
                println!("{}. [{}] {}: {}", position + 1, prompt.id, prompt.name, prompt.prompt);
            }
            return Ok(());
        }
        PromptCommand::Add { name, prompt } => {
            let id = page.add_prompt();
            if let Some(name) = name {
                page.update_prompt(id, PromptField::Name, &name)?;
            }
            if let Some(prompt) = prompt {
                page.update_prompt(id, PromptField::Prompt, &prompt)?;
            }
            println!("Added prompt {}", id);
        }
        PromptCommand::Edit { id, name, prompt } => {
            if name.is_none() && prompt.is_none() {
                return Err("Nothing to change: pass --name and/or --prompt".into());
            }
            if let Some(name) = name {
                page.update_prompt(id, PromptField::Name, &name)?;
            }
            if let Some(prompt) = prompt {
                page.update_prompt(id, PromptField::Prompt, &prompt)?;
            }
        }
        PromptCommand::Delete { id } => {
            page.delete_prompt(id)?;
            println!("Deleted prompt {}", id);
        }
        PromptCommand::Move { from, to } => {
            if from == 0 || to == 0 {
                return Err("Positions start at 1".into());
            }
            page.move_prompt(from - 1, to - 1)?;
        }
    }
    page.save_prompts().await?;
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("API endpoint:     {}", settings.api_endpoint);
    println!("API key:          {}", mask_key(&settings.api_key));
    println!("Selected model:   {}", settings.selected_model);
    println!("Available models: {}", settings.available_models.join(", "));
    println!("Prompts:          {}", settings.custom_prompts.len());
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
