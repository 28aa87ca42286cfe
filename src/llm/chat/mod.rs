pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use self::openai::OpenAIChatClient;
use super::ApiConfig;
use crate::error::Result;
use crate::models::chat::ChatMessage;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends one completion request and returns the first choice's content.
    async fn complete(&self, config: &ApiConfig, messages: &[ChatMessage]) -> Result<String>;

    /// Lists the model identifiers the endpoint offers.
    async fn list_models(&self, endpoint: &str, api_key: &str) -> Result<Vec<String>>;
}

pub fn new_client() -> Result<Arc<dyn ChatClient>> {
    Ok(Arc::new(OpenAIChatClient::new()?))
}
