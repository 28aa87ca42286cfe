use async_trait::async_trait;
use log::{ error, info };
use serde::{ Deserialize, Serialize };
use std::sync::Mutex;
use tokio::sync::watch;

use crate::error::{ HelperError, Result };
use crate::models::settings::Prompt;

pub const ROOT_MENU_ID: &str = "gpt-menu";
pub const ROOT_MENU_TITLE: &str = "GPT Helper";
pub const AD_HOC_MENU_ID: &str = "prompt-on-the-fly";
pub const AD_HOC_MENU_TITLE: &str = "✨ Prompt on the Fly";
const PROMPT_ID_PREFIX: &str = "prompt-";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub title: String,
}

/// What a click on a menu item asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    Prompt(u32),
    AdHoc,
}

impl MenuAction {
    pub fn from_item_id(id: &str) -> Option<Self> {
        if id == AD_HOC_MENU_ID {
            return Some(MenuAction::AdHoc);
        }
        id.strip_prefix(PROMPT_ID_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .map(MenuAction::Prompt)
    }

    pub fn item_id(&self) -> String {
        match self {
            MenuAction::Prompt(id) => format!("{}{}", PROMPT_ID_PREFIX, id),
            MenuAction::AdHoc => AD_HOC_MENU_ID.to_string(),
        }
    }
}

/// Root entry, one child per prompt in stored order, then the ad-hoc entry.
pub fn build_menu(prompts: &[Prompt]) -> Vec<MenuEntry> {
    let mut entries = Vec::with_capacity(prompts.len() + 2);
    entries.push(MenuEntry {
        id: ROOT_MENU_ID.to_string(),
        parent_id: None,
        title: ROOT_MENU_TITLE.to_string(),
    });
    for prompt in prompts {
        entries.push(MenuEntry {
            id: MenuAction::Prompt(prompt.id).item_id(),
            parent_id: Some(ROOT_MENU_ID.to_string()),
            title: prompt.name.clone(),
        });
    }
    entries.push(MenuEntry {
        id: AD_HOC_MENU_ID.to_string(),
        parent_id: Some(ROOT_MENU_ID.to_string()),
        title: AD_HOC_MENU_TITLE.to_string(),
    });
    entries
}

#[async_trait]
pub trait MenuHost: Send + Sync {
    async fn remove_all(&self) -> Result<()>;
    async fn create(&self, entry: &MenuEntry) -> Result<()>;
}

/// Rebuilds the menu from scratch. A failing item is logged and skipped.
pub async fn refresh_menus(host: &dyn MenuHost, prompts: &[Prompt]) -> usize {
    info!("Creating context menus with {} prompts", prompts.len());
    if let Err(e) = host.remove_all().await {
        error!("Error clearing context menus: {}", e);
    }

    let mut created = 0;
    for entry in build_menu(prompts) {
        match host.create(&entry).await {
            Ok(()) => {
                created += 1;
            }
            Err(e) => error!("Error creating menu item {}: {}", entry.id, e),
        }
    }
    created
}

/// In-process menu surface. Pages observe it through `subscribe`.
pub struct MenuRegistry {
    entries: Mutex<Vec<MenuEntry>>,
    published: watch::Sender<Vec<MenuEntry>>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            entries: Mutex::new(Vec::new()),
            published,
        }
    }

    pub fn entries(&self) -> Vec<MenuEntry> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<MenuEntry>> {
        self.published.subscribe()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<MenuEntry>>> {
        self.entries.lock().map_err(|_| HelperError::Menu("menu registry poisoned".to_string()))
    }

    fn publish(&self, entries: &[MenuEntry]) {
        self.published.send_replace(entries.to_vec());
    }
}

impl Default for MenuRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MenuHost for MenuRegistry {
    async fn remove_all(&self) -> Result<()> {
        let mut entries = self.lock()?;
        entries.clear();
        self.publish(&entries);
        Ok(())
    }

    async fn create(&self, entry: &MenuEntry) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(HelperError::Menu(format!("duplicate menu id '{}'", entry.id)));
        }
        if let Some(parent) = &entry.parent_id {
            if !entries.iter().any(|e| &e.id == parent) {
                return Err(HelperError::Menu(format!("unknown parent menu '{}'", parent)));
            }
        }
        entries.push(entry.clone());
        self.publish(&entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(id: u32, name: &str) -> Prompt {
        Prompt { id, name: name.into(), prompt: format!("{} this", name) }
    }

    #[test]
    fn menu_follows_prompt_order_with_ad_hoc_last() {
        let entries = build_menu(&[prompt(5, "Translate"), prompt(2, "Summarize")]);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-menu", "prompt-5", "prompt-2", "prompt-on-the-fly"]);
        assert_eq!(entries[1].title, "Translate");
        assert!(entries[1..].iter().all(|e| e.parent_id.as_deref() == Some(ROOT_MENU_ID)));
    }

    #[test]
    fn empty_prompt_list_still_offers_ad_hoc() {
        let entries = build_menu(&[]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, AD_HOC_MENU_ID);
    }

    #[test]
    fn parses_item_ids() {
        assert_eq!(MenuAction::from_item_id("prompt-12"), Some(MenuAction::Prompt(12)));
        assert_eq!(MenuAction::from_item_id("prompt-on-the-fly"), Some(MenuAction::AdHoc));
        assert_eq!(MenuAction::from_item_id("prompt-x"), None);
        assert_eq!(MenuAction::from_item_id("gpt-menu"), None);
    }

    #[tokio::test]
    async fn failing_item_does_not_stop_the_rest() {
        let registry = MenuRegistry::new();
        let prompts = [prompt(1, "A"), prompt(1, "Duplicate"), prompt(2, "B")];

        let created = refresh_menus(&registry, &prompts).await;

        assert_eq!(created, 4);
        let ids: Vec<String> = registry.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["gpt-menu", "prompt-1", "prompt-2", "prompt-on-the-fly"]);
    }

    #[tokio::test]
    async fn refresh_replaces_previous_menu() {
        let registry = MenuRegistry::new();
        let mut rx = registry.subscribe();
        refresh_menus(&registry, &[prompt(1, "A")]).await;
        refresh_menus(&registry, &[prompt(9, "Z")]).await;

        let latest = rx.borrow_and_update().clone();
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[1].id, "prompt-9");
    }
}
