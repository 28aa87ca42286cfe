pub mod context;
pub mod menus;
pub mod page;

use log::{ error, info, warn };
use std::sync::{ Arc, Weak };
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use self::context::{ CoordinatorContext, Selection };
use self::menus::{ refresh_menus, MenuAction, MenuHost };
use self::page::{ ChatOpening, PageHost };
use crate::config::settings::SettingsStore;
use crate::config::store::KeyValueStore;
use crate::error::{ HelperError, Result };
use crate::history::HistoryStore;
use crate::llm::chat::ChatClient;
use crate::llm::{ ApiConfig, SYSTEM_PROMPT };
use crate::models::chat::{ ChatContext, ChatMessage, ChatReply };
use crate::models::settings::Settings;

pub const AD_HOC_PROMPT_QUESTION: &str = "Enter your custom prompt";

/// Checks that a selection can be sent: credentials, endpoint and model set, text not blank.
pub fn validate_input(settings: &Settings, text: &str) -> Result<()> {
    let missing = settings.missing_fields();
    if !missing.is_empty() {
        return Err(HelperError::Configuration { missing });
    }
    if text.trim().is_empty() {
        return Err(HelperError::EmptySelection);
    }
    Ok(())
}

/// Label of the user bubble that opens the widget.
pub fn opening_message(prompt_text: &str, text: &str) -> String {
    format!("{}\n\n{}", prompt_text, text)
}

/// User turn sent for a selection action.
pub fn selection_turn(prompt_text: &str, text: &str) -> String {
    format!("{}\n\nText: {}", prompt_text, text)
}

/// User turn sent for a follow-up chat message.
pub fn chat_turn(message: &str, context: &ChatContext) -> String {
    if context.original_text.is_empty() {
        message.to_string()
    } else {
        format!("Context:\n{}\n\nMessage: {}", context.original_text, message)
    }
}

pub struct Coordinator {
    store: SettingsStore,
    history: HistoryStore,
    client: Arc<dyn ChatClient>,
    menus: Arc<dyn MenuHost>,
    context: CoordinatorContext,
    chat_turns: Mutex<()>,
}

impl Coordinator {
    /// Builds the coordinator from the store's current contents and creates the menus.
    pub async fn start(
        backend: Arc<dyn KeyValueStore>,
        client: Arc<dyn ChatClient>,
        menus: Arc<dyn MenuHost>
    ) -> Result<Arc<Self>> {
        let store = SettingsStore::new(Arc::clone(&backend));
        let settings = store.load().await?;
        info!(
            "Coordinator starting: endpoint={:?}, model={:?}, prompts={}",
            settings.api_endpoint,
            settings.selected_model,
            settings.custom_prompts.len()
        );
        if !settings.is_configured() {
            warn!("API settings are incomplete, missing: {}", settings.missing_fields().join(", "));
        }

        let coordinator = Arc::new(Self {
            store,
            history: HistoryStore::new(backend),
            client,
            menus,
            context: CoordinatorContext::new(settings),
            chat_turns: Mutex::new(()),
        });
        coordinator.refresh_menus().await;
        Ok(coordinator)
    }

    pub fn context(&self) -> &CoordinatorContext {
        &self.context
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    pub async fn refresh_menus(&self) -> usize {
        let settings = self.context.settings().await;
        refresh_menus(self.menus.as_ref(), &settings.custom_prompts).await
    }

    pub async fn reload_config(&self) -> Result<Settings> {
        info!("Reloading configuration...");
        let settings = self.context.reload(&self.store).await?;
        self.refresh_menus().await;
        Ok(settings)
    }

    /// Keeps the settings mirror current from store notifications and rebuilds
    /// the menus whenever the prompt list changes.
    pub fn spawn_settings_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let received = changes.recv().await;
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                match received {
                    Ok(change) => {
                        if coordinator.context.apply_change(&change).await {
                            coordinator.refresh_menus().await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} settings changes, reloading", skipped);
                        if let Err(e) = coordinator.reload_config().await {
                            error!("Error loading configuration: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => {
                        break;
                    }
                }
            }
        })
    }

    pub async fn text_selected(&self, text: &str, url: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.context.remember_selection(Selection {
            text: text.to_string(),
            url: url.to_string(),
        }).await;
    }

    /// Dispatches a context-menu click. Unknown items and dismissed ad-hoc prompts are no-ops.
    pub async fn handle_menu_click(
        &self,
        item_id: &str,
        selection_text: Option<&str>,
        page: &dyn PageHost
    ) -> Result<()> {
        let text = match selection_text {
            Some(text) => text.to_string(),
            None => self.context.last_selection().await.map(|s| s.text).unwrap_or_default(),
        };

        match MenuAction::from_item_id(item_id) {
            Some(MenuAction::AdHoc) => {
                let answer = page.prompt(AD_HOC_PROMPT_QUESTION).await?;
                match answer.as_deref().map(str::trim) {
                    Some(prompt_text) if !prompt_text.is_empty() => {
                        self.handle_selection_action(&text, prompt_text, page).await
                    }
                    _ => Ok(()),
                }
            }
            Some(MenuAction::Prompt(id)) => {
                let settings = self.context.settings().await;
                match settings.find_prompt(id) {
                    Some(prompt) => {
                        let prompt_text = prompt.prompt.clone();
                        self.handle_selection_action(&text, &prompt_text, page).await
                    }
                    None => {
                        warn!("Menu click for unknown prompt {}", id);
                        Err(HelperError::UnknownPrompt(id))
                    }
                }
            }
            None => {
                warn!("Ignoring click on menu item {}", item_id);
                Ok(())
            }
        }
    }

    /// Sends `prompt_text` applied to `text` and shows the exchange in the page's widget.
    pub async fn handle_selection_action(
        &self,
        text: &str,
        prompt_text: &str,
        page: &dyn PageHost
    ) -> Result<()> {
        let settings = match self.context.reload(&self.store).await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Error loading configuration: {}", e);
                self.context.settings().await
            }
        };

        if let Err(e) = validate_input(&settings, text) {
            page.alert(&e.to_string()).await?;
            return Err(e);
        }

        let overlay_enabled = match self.store.load_preferences().await {
            Ok(preferences) => preferences.overlay_enabled,
            Err(e) => {
                warn!("Could not read UI preferences: {}", e);
                true
            }
        };
        let opening = ChatOpening {
            model: settings.selected_model.clone(),
            initial_message: opening_message(prompt_text, text),
            overlay_enabled,
        };
        if let Err(e) = page.show_chat(&opening).await {
            error!("Error showing chat window: {}", e);
            page.alert(&format!("Error showing chat window: {}", e)).await?;
            return Err(e);
        }

        let user_turn = selection_turn(prompt_text, text);
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_turn.clone())];

        let _turn = self.chat_turns.lock().await;
        match self.client.complete(&ApiConfig::from(&settings), &messages).await {
            Ok(reply) => {
                if let Err(e) = self.record_exchange(&user_turn, &reply).await {
                    error!("Error saving chat history: {}", e);
                }
                page.append_chat_response(&reply).await
            }
            Err(e) => {
                error!("Processing error: {}", e);
                if let Err(page_err) = page.append_chat_error(&e.to_string()).await {
                    warn!("Could not show error in chat window: {}", page_err);
                }
                page.alert(&format!("Error processing text: {}", e)).await?;
                Err(e)
            }
        }
    }

    /// Callers hold `chat_turns`.
    async fn record_exchange(&self, user: &str, assistant: &str) -> Result<()> {
        let mut history = self.history.load().await?;
        history.push_exchange(user, assistant);
        self.history.save(&history).await?;
        Ok(())
    }

    /// Continues the conversation. Failures come back as `ChatReply::Error`.
    pub async fn chat(&self, message: &str, context: &ChatContext) -> ChatReply {
        match self.continue_chat(message, context).await {
            Ok(message) => ChatReply::Message { message },
            Err(e) => {
                error!("Chat error: {}", e);
                ChatReply::Error { error: e.to_string() }
            }
        }
    }

    async fn continue_chat(&self, message: &str, context: &ChatContext) -> Result<String> {
        let settings = self.context.settings().await;
        let missing = settings.missing_fields();
        if !missing.is_empty() {
            return Err(HelperError::Configuration { missing });
        }
        if message.trim().is_empty() {
            return Err(HelperError::Validation("Please enter a message".to_string()));
        }

        // Held across the call so concurrent turns queue instead of overwriting each other.
        let _turn = self.chat_turns.lock().await;
        let mut history = self.history.load().await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(history.messages().iter().cloned());
        messages.push(ChatMessage::user(chat_turn(message, context)));

        let reply = self.client.complete(&ApiConfig::from(&settings), &messages).await?;

        history.push_exchange(message, reply.clone());
        self.history.save(&history).await?;
        Ok(reply)
    }

    pub async fn reset_chat_context(&self) -> Result<()> {
        // Waits for an in-flight turn so its late save cannot bring the history back.
        let _turn = self.chat_turns.lock().await;
        info!("Resetting chat history");
        self.history.clear().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::menus::MenuRegistry;
    use crate::config::store::MemoryStore;
    use crate::history::MAX_HISTORY_ENTRIES;
    use crate::models::chat::Role;
    use crate::models::settings::Prompt;
    use crate::testing::{ FakeChatClient, PageEvent, RecordingPage };

    fn configured() -> Settings {
        Settings {
            api_key: "sk-test".into(),
            api_endpoint: "https://api.example.com/v1".into(),
            selected_model: "gpt-4o-mini".into(),
            available_models: vec![],
            custom_prompts: vec![
                Prompt { id: 1, name: "French".into(), prompt: "Translate to French".into() },
                Prompt { id: 2, name: "Summary".into(), prompt: "Summarize".into() },
            ],
        }
    }

    async fn coordinator_with(
        settings: Settings,
        client: Arc<FakeChatClient>
    ) -> (Arc<Coordinator>, Arc<MenuRegistry>, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        SettingsStore::new(backend.clone()).replace(settings).await.unwrap();
        let menus = Arc::new(MenuRegistry::new());
        let coordinator = Coordinator::start(backend.clone(), client, menus.clone()).await.unwrap();
        (coordinator, menus, backend)
    }

    #[tokio::test]
    async fn unconfigured_selection_alerts_without_calling_api() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(Settings::default(), client.clone()).await;
        let page = RecordingPage::new();

        let result = coordinator.handle_selection_action("any text", "Explain", &page).await;

        assert!(matches!(result, Err(HelperError::Configuration { .. })));
        assert_eq!(page.events(), vec![
            PageEvent::Alert("Please configure API settings in the extension options".into())
        ]);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn blank_selection_alerts() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        let page = RecordingPage::new();

        let result = coordinator.handle_selection_action("  \n ", "Explain", &page).await;

        assert!(matches!(result, Err(HelperError::EmptySelection)));
        assert_eq!(page.events(), vec![PageEvent::Alert("Please select some text to process".into())]);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn translate_selection_round_trip() {
        let client = Arc::new(FakeChatClient::with_replies(vec![Ok("Bonjour le monde".into())]));
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        let page = RecordingPage::new();

        coordinator.handle_selection_action("Hello world", "Translate to French", &page).await.unwrap();

        let (config, messages) = client.last_request().unwrap();
        assert_eq!(config.endpoint, "https://api.example.com/v1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "Translate to French\n\nText: Hello world");

        assert_eq!(page.events(), vec![
            PageEvent::ShowChat(ChatOpening {
                model: "gpt-4o-mini".into(),
                initial_message: "Translate to French\n\nHello world".into(),
                overlay_enabled: true,
            }),
            PageEvent::Response("Bonjour le monde".into()),
        ]);
    }

    #[tokio::test]
    async fn api_failure_alerts_and_marks_widget() {
        let client = Arc::new(FakeChatClient::with_replies(vec![
            Err(HelperError::Http { status: 500, body: "boom".into() })
        ]));
        let (coordinator, _, _) = coordinator_with(configured(), client).await;
        let page = RecordingPage::new();

        let result = coordinator.handle_selection_action("text", "Summarize", &page).await;

        assert!(matches!(result, Err(HelperError::Http { status: 500, .. })));
        let events = page.events();
        assert_eq!(events[1], PageEvent::Error("API request failed (500): boom".into()));
        assert_eq!(
            events[2],
            PageEvent::Alert("Error processing text: API request failed (500): boom".into())
        );
    }

    #[tokio::test]
    async fn chat_sends_history_and_context() {
        let client = Arc::new(FakeChatClient::with_replies(vec![
            Ok("first".into()),
            Ok("second".into()),
        ]));
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        let context = ChatContext {
            original_text: "Summarize\n\nlong text".into(),
            result_text: String::new(),
        };

        assert_eq!(coordinator.chat("shorter", &context).await, ChatReply::Message {
            message: "first".into(),
        });
        coordinator.chat("again", &ChatContext::default()).await;

        let (_, messages) = client.last_request().unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![SYSTEM_PROMPT, "shorter", "first", "again"]);

        let (_, first) = client.request(0).unwrap();
        assert_eq!(first[1].content, "Context:\nSummarize\n\nlong text\n\nMessage: shorter");
    }

    #[tokio::test]
    async fn chat_history_is_capped() {
        let replies = (0..12).map(|i| Ok(format!("a{}", i))).collect();
        let client = Arc::new(FakeChatClient::with_replies(replies));
        let (coordinator, _, backend) = coordinator_with(configured(), client).await;

        for i in 0..12 {
            coordinator.chat(&format!("q{}", i), &ChatContext::default()).await;
        }

        let history = HistoryStore::new(backend).load().await.unwrap();
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(history.messages()[0].content, "q2");
        assert_eq!(history.messages()[19].content, "a11");
    }

    #[tokio::test]
    async fn chat_error_becomes_error_payload() {
        let client = Arc::new(FakeChatClient::with_replies(vec![
            Err(HelperError::Http { status: 429, body: "slow down".into() })
        ]));
        let (coordinator, _, backend) = coordinator_with(configured(), client).await;

        let reply = coordinator.chat("hi", &ChatContext::default()).await;

        assert_eq!(reply, ChatReply::Error { error: "API request failed (429): slow down".into() });
        assert!(HistoryStore::new(backend).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_requires_configuration() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(Settings::default(), client.clone()).await;

        let reply = coordinator.chat("hi", &ChatContext::default()).await;

        assert!(matches!(reply, ChatReply::Error { .. }));
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, backend) = coordinator_with(configured(), client).await;
        coordinator.chat("hi", &ChatContext::default()).await;

        coordinator.reset_chat_context().await.unwrap();

        assert!(HistoryStore::new(backend).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_waits_for_in_flight_turn() {
        let client = Arc::new(FakeChatClient::with_replies(vec![Ok("old a".into()), Ok("late reply".into())]));
        let (coordinator, _, backend) = coordinator_with(configured(), client.clone()).await;
        coordinator.chat("old q", &ChatContext::default()).await;

        let gate = client.hold_completions();
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.chat("new q", &ChatContext::default()).await })
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while client.request_count() < 2 {
                tokio::task::yield_now().await;
            }
        }).await.unwrap();

        let reset = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.reset_chat_context().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!reset.is_finished());

        gate.add_permits(1);
        assert_eq!(pending.await.unwrap(), ChatReply::Message { message: "late reply".into() });
        reset.await.unwrap().unwrap();

        assert!(HistoryStore::new(backend).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn menu_click_uses_stored_prompt() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        let page = RecordingPage::new();

        coordinator.handle_menu_click("prompt-2", Some("some text"), &page).await.unwrap();

        let (_, messages) = client.last_request().unwrap();
        assert_eq!(messages[1].content, "Summarize\n\nText: some text");
    }

    #[tokio::test]
    async fn ad_hoc_click_asks_for_prompt_text() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        let page = RecordingPage::answering(Some("  Make it rhyme "));

        coordinator.handle_menu_click("prompt-on-the-fly", Some("roses"), &page).await.unwrap();

        assert_eq!(page.events()[0], PageEvent::Prompt(AD_HOC_PROMPT_QUESTION.into()));
        let (_, messages) = client.last_request().unwrap();
        assert_eq!(messages[1].content, "Make it rhyme\n\nText: roses");
    }

    #[tokio::test]
    async fn dismissed_ad_hoc_prompt_does_nothing() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        let page = RecordingPage::answering(Some("   "));

        coordinator.handle_menu_click("prompt-on-the-fly", Some("roses"), &page).await.unwrap();

        assert_eq!(client.request_count(), 0);
        assert_eq!(page.events().len(), 1);
    }

    #[tokio::test]
    async fn menu_click_falls_back_to_last_selection() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(configured(), client.clone()).await;
        coordinator.text_selected("remembered", "https://a.test").await;

        coordinator.handle_menu_click("prompt-1", None, &RecordingPage::new()).await.unwrap();

        let (_, messages) = client.last_request().unwrap();
        assert_eq!(messages[1].content, "Translate to French\n\nText: remembered");
    }

    #[tokio::test]
    async fn unknown_prompt_is_reported() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, _, _) = coordinator_with(configured(), client).await;

        let result = coordinator.handle_menu_click("prompt-99", Some("x"), &RecordingPage::new()).await;
        assert!(matches!(result, Err(HelperError::UnknownPrompt(99))));
    }

    #[tokio::test]
    async fn watcher_rebuilds_menus_on_prompt_change() {
        let client = Arc::new(FakeChatClient::new());
        let (coordinator, menus, _) = coordinator_with(configured(), client).await;
        assert_eq!(menus.entries().len(), 4);
        let mut published = menus.subscribe();
        let _watcher = coordinator.spawn_settings_watcher();

        coordinator
            .settings_store()
            .save_prompts(&[Prompt { id: 7, name: "Only".into(), prompt: "p".into() }])
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                published.changed().await.unwrap();
                let entries = published.borrow_and_update().clone();
                if entries.len() == 3 && entries[1].id == "prompt-7" {
                    break;
                }
            }
        }).await.unwrap();
        assert_eq!(coordinator.context().settings().await.custom_prompts.len(), 1);
    }
}
