//! Fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };
use tokio::sync::Semaphore;

use crate::background::page::{ ChatOpening, PageHost };
use crate::error::{ HelperError, Result };
use crate::llm::chat::ChatClient;
use crate::llm::ApiConfig;
use crate::models::chat::ChatMessage;

type Request = (ApiConfig, Vec<ChatMessage>);

/// Chat client that replays scripted replies and records requests.
/// Once the script runs out every call answers "ok".
pub struct FakeChatClient {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<Request>>,
    models: Mutex<Vec<String>>,
    models_failure: Mutex<Option<(u16, String)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeChatClient {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
            models_failure: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    /// Makes later completions wait after recording their request until a permit
    /// is added to the returned semaphore.
    pub fn hold_completions(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_models(&self, models: Vec<String>) {
        *self.models.lock().unwrap() = models;
        *self.models_failure.lock().unwrap() = None;
    }

    /// Makes model listing answer with an HTTP error.
    pub fn fail_models(&self, status: u16, body: &str) {
        *self.models_failure.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Option<Request> {
        self.requests.lock().unwrap().get(index).cloned()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn complete(&self, config: &ApiConfig, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push((config.clone(), messages.to_vec()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok("ok".to_string()))
    }

    async fn list_models(&self, _endpoint: &str, _api_key: &str) -> Result<Vec<String>> {
        if let Some((status, body)) = self.models_failure.lock().unwrap().clone() {
            return Err(HelperError::Http { status, body });
        }
        Ok(self.models.lock().unwrap().clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    Alert(String),
    Prompt(String),
    ShowChat(ChatOpening),
    Response(String),
    Error(String),
}

/// Page host that records everything the coordinator asks of it.
pub struct RecordingPage {
    events: Mutex<Vec<PageEvent>>,
    prompt_answer: Option<String>,
}

impl RecordingPage {
    pub fn new() -> Self {
        Self::answering(None)
    }

    pub fn answering(answer: Option<&str>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            prompt_answer: answer.map(str::to_string),
        }
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: PageEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl PageHost for RecordingPage {
    async fn alert(&self, message: &str) -> Result<()> {
        self.record(PageEvent::Alert(message.to_string()));
        Ok(())
    }

    async fn prompt(&self, message: &str) -> Result<Option<String>> {
        self.record(PageEvent::Prompt(message.to_string()));
        Ok(self.prompt_answer.clone())
    }

    async fn show_chat(&self, opening: &ChatOpening) -> Result<()> {
        self.record(PageEvent::ShowChat(opening.clone()));
        Ok(())
    }

    async fn append_chat_response(&self, response_text: &str) -> Result<()> {
        self.record(PageEvent::Response(response_text.to_string()));
        Ok(())
    }

    async fn append_chat_error(&self, message: &str) -> Result<()> {
        self.record(PageEvent::Error(message.to_string()));
        Ok(())
    }
}
