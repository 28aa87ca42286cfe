//! Floating chat panel shown next to a page, modelled as a state machine.
//!
//! The widget never talks to the coordinator directly. Operations return
//! [`WidgetEffect`]s that the host forwards (chat requests, history resets,
//! clipboard writes), and the host feeds results back in.

pub mod drag;
pub mod render;

use chrono::Local;
use log::debug;

use self::drag::{ Drag, Position, Viewport };
use crate::background::page::ChatOpening;
use crate::models::chat::ChatContext;

pub const COPIED_NOTICE: &str = "Copied!";
pub const COPY_FAILED_NOTICE: &str = "Could not copy the response";
const ERROR_PREFIX: &str = "Error: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    Absent,
    OpenEmpty,
    OpenWithHistory,
    AwaitingResponse,
}

impl WidgetState {
    pub fn is_open(&self) -> bool {
        !matches!(self, WidgetState::Absent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BubbleKind {
    User,
    Assistant,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bubble {
    pub kind: BubbleKind,
    pub text: String,
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
}

impl Bubble {
    fn new(kind: BubbleKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            time: Local::now().format("%H:%M").to_string(),
        }
    }
}

/// Requests the widget hands to its host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetEffect {
    SendChat {
        message: String,
        context: ChatContext,
    },
    ResetChatContext,
    WriteClipboard(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Char(char),
    Backspace,
}

pub struct ChatWidget {
    state: WidgetState,
    model: String,
    overlay_enabled: bool,
    bubbles: Vec<Bubble>,
    input: String,
    context: ChatContext,
    notice: Option<String>,
    prefers_dark: bool,
    dark_mode: bool,
    viewport: Viewport,
    position: Position,
    drag: Option<Drag>,
}

impl Default for ChatWidget {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl ChatWidget {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: WidgetState::Absent,
            model: String::new(),
            overlay_enabled: true,
            bubbles: Vec::new(),
            input: String::new(),
            context: ChatContext::default(),
            notice: None,
            prefers_dark: false,
            dark_mode: false,
            viewport,
            position: Position::default_for(viewport),
            drag: None,
        }
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_dark(&self) -> bool {
        self.dark_mode
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_typing(&self) -> bool {
        self.state == WidgetState::AwaitingResponse
    }

    /// Opens the panel, or extends the open one with a new exchange.
    pub fn show(&mut self, opening: &ChatOpening) {
        if !self.state.is_open() {
            self.bubbles.clear();
            self.input.clear();
            self.notice = None;
            self.drag = None;
            self.position = Position::default_for(self.viewport);
            self.context = ChatContext::default();
            self.dark_mode = self.prefers_dark;
            self.state = WidgetState::OpenEmpty;
        }
        self.model = opening.model.clone();
        self.overlay_enabled = opening.overlay_enabled;

        if opening.initial_message.is_empty() {
            return;
        }
        if self.context.original_text.is_empty() {
            self.context.original_text = opening.initial_message.clone();
        }
        self.bubbles.push(Bubble::new(BubbleKind::User, opening.initial_message.clone()));
        self.state = WidgetState::AwaitingResponse;
    }

    pub fn receive_response(&mut self, text: &str) {
        if !self.state.is_open() {
            debug!("Dropping response for a closed chat window");
            return;
        }
        if self.context.result_text.is_empty() {
            self.context.result_text = text.to_string();
        }
        self.bubbles.push(Bubble::new(BubbleKind::Assistant, text));
        self.state = WidgetState::OpenWithHistory;
    }

    pub fn receive_error(&mut self, message: &str) {
        if !self.state.is_open() {
            debug!("Dropping error for a closed chat window: {}", message);
            return;
        }
        self.bubbles.push(Bubble::new(BubbleKind::Error, format!("{}{}", ERROR_PREFIX, message)));
        self.state = WidgetState::OpenWithHistory;
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Enter submits, Shift+Enter inserts a newline.
    pub fn key_down(&mut self, key: Key, shift: bool) -> Option<WidgetEffect> {
        if !self.state.is_open() {
            return None;
        }
        match key {
            Key::Enter if shift => {
                self.input.push('\n');
                None
            }
            Key::Enter => self.submit(),
            Key::Char(c) => {
                self.input.push(c);
                None
            }
            Key::Backspace => {
                self.input.pop();
                None
            }
        }
    }

    /// Sends the current input. Refused while a reply is pending or the input is blank.
    pub fn submit(&mut self) -> Option<WidgetEffect> {
        match self.state {
            WidgetState::Absent | WidgetState::AwaitingResponse => {
                return None;
            }
            WidgetState::OpenEmpty | WidgetState::OpenWithHistory => {}
        }
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.input.clear();
        self.notice = None;
        self.bubbles.push(Bubble::new(BubbleKind::User, message.clone()));
        self.state = WidgetState::AwaitingResponse;
        Some(WidgetEffect::SendChat {
            message,
            context: self.context.clone(),
        })
    }

    pub fn close(&mut self) -> Option<WidgetEffect> {
        if !self.state.is_open() {
            return None;
        }
        self.state = WidgetState::Absent;
        self.bubbles.clear();
        self.input.clear();
        self.notice = None;
        self.drag = None;
        self.context = ChatContext::default();
        Some(WidgetEffect::ResetChatContext)
    }

    pub fn last_response(&self) -> Option<&str> {
        self.bubbles
            .iter()
            .rev()
            .find(|b| b.kind == BubbleKind::Assistant)
            .map(|b| b.text.as_str())
    }

    pub fn copy_last_response(&self) -> Option<WidgetEffect> {
        if !self.state.is_open() {
            return None;
        }
        self.last_response().map(|text| WidgetEffect::WriteClipboard(text.to_string()))
    }

    /// A successful copy flashes the notice and closes the panel.
    pub fn clipboard_written(&mut self, success: bool) -> Option<WidgetEffect> {
        if success {
            let effect = self.close();
            self.notice = Some(COPIED_NOTICE.to_string());
            effect
        } else {
            self.notice = Some(COPY_FAILED_NOTICE.to_string());
            None
        }
    }

    pub fn color_scheme_changed(&mut self, dark: bool) {
        self.prefers_dark = dark;
        if self.state.is_open() {
            self.dark_mode = dark;
        }
    }

    /// Starts a drag when the press lands on the header.
    pub fn pointer_down(&mut self, x: f64, y: f64, on_header: bool) {
        if self.state.is_open() && on_header {
            self.drag = Some(Drag::start(self.position, x, y));
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some(drag) = &self.drag {
            self.position = drag.follow(x, y, self.viewport);
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn resize_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.position = self.position.clamped(viewport);
    }
}
