use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::error::Result;

/// What the coordinator asks a page to open the chat widget with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOpening {
    pub model: String,
    pub initial_message: String,
    pub overlay_enabled: bool,
}

/// The tab a selection came from, as seen by the coordinator.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Blocking notice in the page.
    async fn alert(&self, message: &str) -> Result<()>;

    /// Asks the user for free-form text. `None` when dismissed.
    async fn prompt(&self, message: &str) -> Result<Option<String>>;

    async fn show_chat(&self, opening: &ChatOpening) -> Result<()>;

    async fn append_chat_response(&self, response_text: &str) -> Result<()>;

    async fn append_chat_error(&self, message: &str) -> Result<()>;
}
