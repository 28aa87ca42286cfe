pub mod commands;

use clap::{ Parser, Subcommand };
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the settings and chat history files.
    #[arg(long, env = "GPT_HELPER_DATA_DIR", default_value = ".gpt-helper")]
    pub data_dir: PathBuf,

    /// Host address and port for the page WebSocket server.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the settings HTTP API. Disabled when not set.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve pages over WebSocket (default)
    Serve,
    /// Apply a prompt to some text and continue the chat in the terminal
    Ask {
        /// Id of a stored prompt
        #[arg(long, conflicts_with = "prompt")]
        prompt_id: Option<u32>,
        /// Ad-hoc prompt text
        #[arg(long)]
        prompt: Option<String>,
        /// The selected text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Manage stored prompts
    Prompts {
        #[command(subcommand)]
        command: PromptCommand,
    },
    /// Show or change API settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Fetch and store the model list from the configured endpoint
    Models,
    /// Check that the configured endpoint answers
    TestConnection,
    /// Write the settings to a JSON file
    Export {
        /// Target file. Defaults to a timestamped name in the current directory.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the settings with a JSON file
    Import {
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PromptCommand {
    List,
    Add {
        name: Option<String>,
        prompt: Option<String>,
    },
    Edit {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
    },
    Delete {
        id: u32,
    },
    /// Move the prompt at position FROM to position TO (1-based)
    Move {
        from: usize,
        to: usize,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        api_endpoint: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}
