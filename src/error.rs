use thiserror::Error;

use crate::config::store::StoreError;

pub const CONFIGURE_SETTINGS_MESSAGE: &str = "Please configure API settings in the extension options";
pub const EMPTY_SELECTION_MESSAGE: &str = "Please select some text to process";

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("{}", CONFIGURE_SETTINGS_MESSAGE)]
    Configuration { missing: Vec<&'static str> },

    #[error("{}", EMPTY_SELECTION_MESSAGE)]
    EmptySelection,

    #[error("API request failed ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Parse(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Page unavailable: {0}")]
    Page(String),

    #[error("Menu error: {0}")]
    Menu(String),

    #[error("Prompt '{0}' not found")]
    UnknownPrompt(u32),

    #[error("{0}")]
    Validation(String),
}

impl From<serde_json::Error> for HelperError {
    fn from(err: serde_json::Error) -> Self {
        HelperError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HelperError>;
