//! Terminal page host: the chat widget rendered as text, driven from stdin.

use async_trait::async_trait;
use log::{ debug, warn };
use std::io::Write;
use std::sync::{ Mutex, MutexGuard };
use tokio::io::{ stdin, AsyncBufReadExt, BufReader, Lines, Stdin };
use tokio::sync::Mutex as AsyncMutex;

use crate::background::page::{ ChatOpening, PageHost };
use crate::background::Coordinator;
use crate::error::{ HelperError, Result };
use crate::models::chat::ChatReply;
use crate::widget::render::{ render, render_last };
use crate::widget::{ ChatWidget, Key, WidgetEffect };

const COPY_COMMAND: &str = "/copy";
const CLOSE_COMMAND: &str = "/close";

pub struct TerminalPage {
    widget: Mutex<ChatWidget>,
    input: AsyncMutex<Lines<BufReader<Stdin>>>,
}

impl TerminalPage {
    pub fn new() -> Self {
        Self {
            widget: Mutex::new(ChatWidget::default()),
            input: AsyncMutex::new(BufReader::new(stdin()).lines()),
        }
    }

    fn widget(&self) -> Result<MutexGuard<'_, ChatWidget>> {
        self.widget.lock().map_err(|_| HelperError::Page("chat window state poisoned".to_string()))
    }

    async fn read_line(&self) -> Result<Option<String>> {
        let mut input = self.input.lock().await;
        input.next_line().await.map_err(|e| HelperError::Page(format!("cannot read input: {}", e)))
    }

    fn print_last(&self) -> Result<()> {
        if let Some(line) = render_last(&*self.widget()?) {
            println!("{}", line);
        }
        Ok(())
    }

    /// Keeps the conversation going until the window is closed, copied or input ends.
    pub async fn run_session(&self, coordinator: &Coordinator) -> Result<()> {
        if !self.widget()?.state().is_open() {
            return Ok(());
        }
        println!("(type a follow-up, {} to copy the last answer and close, {} to close)", COPY_COMMAND, CLOSE_COMMAND);

        loop {
            prompt_marker();
            let effect = match self.read_line().await? {
                None => self.widget()?.close(),
                Some(line) if line.trim() == CLOSE_COMMAND => self.widget()?.close(),
                Some(line) if line.trim() == COPY_COMMAND => {
                    let copy = self.widget()?.copy_last_response();
                    if copy.is_none() {
                        println!("Nothing to copy yet");
                    }
                    copy
                }
                Some(line) => {
                    let mut widget = self.widget()?;
                    widget.set_input(line);
                    widget.key_down(Key::Enter, false)
                }
            };

            if let Some(effect) = effect {
                self.apply(effect, coordinator).await?;
            }
            if !self.widget()?.state().is_open() {
                let notice = render(&*self.widget()?);
                if !notice.is_empty() {
                    print!("{}", notice);
                }
                return Ok(());
            }
        }
    }

    async fn apply(&self, effect: WidgetEffect, coordinator: &Coordinator) -> Result<()> {
        match effect {
            WidgetEffect::SendChat { message, context } => {
                match coordinator.chat(&message, &context).await {
                    ChatReply::Message { message } => self.widget()?.receive_response(&message),
                    ChatReply::Error { error } => self.widget()?.receive_error(&error),
                }
                self.print_last()
            }
            WidgetEffect::ResetChatContext => coordinator.reset_chat_context().await,
            WidgetEffect::WriteClipboard(text) => {
                let written = write_clipboard(&text);
                let follow_up = self.widget()?.clipboard_written(written);
                if !written {
                    if let Some(notice) = self.widget()?.notice() {
                        println!("{}", notice);
                    }
                }
                match follow_up {
                    Some(WidgetEffect::ResetChatContext) => coordinator.reset_chat_context().await,
                    Some(other) => {
                        debug!("Unexpected effect after copy: {:?}", other);
                        Ok(())
                    }
                    None => Ok(()),
                }
            }
        }
    }
}

impl Default for TerminalPage {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt_marker() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn write_clipboard(text: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_string())) {
        Ok(()) => true,
        Err(e) => {
            warn!("Copy failed: {}", e);
            false
        }
    }
}

#[async_trait]
impl PageHost for TerminalPage {
    async fn alert(&self, message: &str) -> Result<()> {
        eprintln!("! {}", message);
        Ok(())
    }

    async fn prompt(&self, message: &str) -> Result<Option<String>> {
        print!("{}: ", message);
        let _ = std::io::stdout().flush();
        self.read_line().await
    }

    async fn show_chat(&self, opening: &ChatOpening) -> Result<()> {
        let mut widget = self.widget()?;
        widget.show(opening);
        print!("{}", render(&widget));
        Ok(())
    }

    async fn append_chat_response(&self, response_text: &str) -> Result<()> {
        self.widget()?.receive_response(response_text);
        self.print_last()
    }

    async fn append_chat_error(&self, message: &str) -> Result<()> {
        self.widget()?.receive_error(message);
        self.print_last()
    }
}
