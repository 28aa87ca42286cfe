use log::{ debug, warn };
use serde_json::{ Map, Value };
use std::sync::Arc;

use crate::config::store::{ KeyValueStore, StorageArea, StoreError };
use crate::models::chat::{ ChatMessage, Role };

pub const CHAT_HISTORY_KEY: &str = "chatHistory";
/// Ten user/assistant exchanges.
pub const MAX_HISTORY_ENTRIES: usize = 20;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from stored messages, keeping only well-formed user/assistant pairs.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        let mut kept = Vec::with_capacity(messages.len());
        let mut iter = messages.into_iter().peekable();
        while let Some(message) = iter.next() {
            if message.role != Role::User {
                continue;
            }
            if let Some(next) = iter.peek() {
                if next.role == Role::Assistant {
                    kept.push(message);
                    if let Some(reply) = iter.next() {
                        kept.push(reply);
                    }
                }
            }
        }
        let mut history = Self { messages: kept };
        history.trim();
        history
    }

    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(ChatMessage::user(user));
        self.messages.push(ChatMessage::assistant(assistant));
        self.trim();
    }

    /// Drops the oldest entries until at most `MAX_HISTORY_ENTRIES` remain.
    pub fn trim(&mut self) {
        if self.messages.len() > MAX_HISTORY_ENTRIES {
            let excess = self.messages.len() - MAX_HISTORY_ENTRIES;
            self.messages.drain(..excess);
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Chat history persisted in the local storage area.
#[derive(Clone)]
pub struct HistoryStore {
    backend: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub async fn load(&self) -> Result<ChatHistory, StoreError> {
        let items = self.backend.get(StorageArea::Local, &[CHAT_HISTORY_KEY]).await?;
        let messages = match items.get(CHAT_HISTORY_KEY) {
            Some(value) =>
                serde_json::from_value::<Vec<ChatMessage>>(value.clone()).unwrap_or_else(|e| {
                    warn!("Discarding unreadable chat history: {}", e);
                    Vec::new()
                }),
            None => Vec::new(),
        };
        Ok(ChatHistory::from_messages(messages))
    }

    pub async fn save(&self, history: &ChatHistory) -> Result<(), StoreError> {
        let value = serde_json::to_value(history.messages()).unwrap_or(Value::Array(Vec::new()));
        let mut items = Map::new();
        items.insert(CHAT_HISTORY_KEY.to_string(), value);
        debug!("Persisting chat history with {} entries", history.len());
        self.backend.set(StorageArea::Local, items).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove(StorageArea::Local, &[CHAT_HISTORY_KEY]).await
    }
}
