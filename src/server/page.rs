use async_trait::async_trait;
use log::{ debug, warn };
use std::collections::HashMap;
use tokio::sync::{ mpsc, oneshot, Mutex };
use uuid::Uuid;

use crate::background::page::{ ChatOpening, PageHost };
use crate::error::{ HelperError, Result };
use crate::models::websocket::ServerMessage;

/// Page host for one WebSocket connection. Outgoing messages go through the
/// connection's writer task; prompt questions wait for a matching `promptAnswer`.
pub struct SocketPage {
    outbox: mpsc::UnboundedSender<ServerMessage>,
    pending: Mutex<PendingPrompts>,
}

/// Prompt waiters keyed by request id. Once closed no new waiter is accepted.
#[derive(Default)]
struct PendingPrompts {
    closed: bool,
    waiters: HashMap<String, oneshot::Sender<Option<String>>>,
}

impl SocketPage {
    pub fn new(outbox: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            outbox,
            pending: Mutex::new(PendingPrompts::default()),
        }
    }

    pub fn send(&self, message: ServerMessage) -> Result<()> {
        self.outbox.send(message).map_err(|_| HelperError::Page("connection closed".to_string()))
    }

    /// Hands an answer to the prompt waiting on `request_id`. Returns false for unknown ids.
    pub async fn resolve_prompt(&self, request_id: &str, answer: Option<String>) -> bool {
        match self.pending.lock().await.waiters.remove(request_id) {
            Some(waiter) => waiter.send(answer).is_ok(),
            None => {
                warn!("No pending prompt for request {}", request_id);
                false
            }
        }
    }

    /// Drops every waiting prompt, which fails them, and refuses later ones.
    pub async fn abandon_prompts(&self) {
        let mut pending = self.pending.lock().await;
        pending.closed = true;
        if !pending.waiters.is_empty() {
            debug!("Abandoning {} pending prompts", pending.waiters.len());
        }
        pending.waiters.clear();
    }
}

#[async_trait]
impl PageHost for SocketPage {
    async fn alert(&self, message: &str) -> Result<()> {
        self.send(ServerMessage::Alert { message: message.to_string() })
    }

    async fn prompt(&self, message: &str) -> Result<Option<String>> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(HelperError::Page("connection closed".to_string()));
            }
            pending.waiters.insert(request_id.clone(), tx);
        }

        if let Err(e) = self.send(ServerMessage::Prompt {
            request_id: request_id.clone(),
            message: message.to_string(),
        }) {
            self.pending.lock().await.waiters.remove(&request_id);
            return Err(e);
        }

        rx.await.map_err(|_| HelperError::Page("prompt was abandoned".to_string()))
    }

    async fn show_chat(&self, opening: &ChatOpening) -> Result<()> {
        self.send(ServerMessage::ShowChatWindow {
            model: opening.model.clone(),
            initial_message: opening.initial_message.clone(),
            overlay_enabled: opening.overlay_enabled,
        })
    }

    async fn append_chat_response(&self, response_text: &str) -> Result<()> {
        self.send(ServerMessage::AppendChatResponse { response_text: response_text.to_string() })
    }

    async fn append_chat_error(&self, message: &str) -> Result<()> {
        self.send(ServerMessage::AppendChatError { message: message.to_string() })
    }
}
