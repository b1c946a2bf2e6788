//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::history_view::SortMode;

/// BaiNian - remember words by asking how to remember them
#[derive(Parser)]
#[command(name = "bainian")]
#[command(about = "BaiNian - explain selected text and keep a study history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides $BAINIAN_HOME and the platform default)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Disable ANSI colours
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Explain a piece of text and show the result as a notification
    Lookup {
        /// The selected text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Start the page without a receiver, forcing the injection path
        #[arg(long)]
        no_receiver: bool,
    },

    /// Browse and manage the study history
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Raw JSON editing of the history
    Editor {
        #[command(subcommand)]
        action: EditorCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Send a trivial request to check the key and endpoint
    TestConnection {
        /// Key to test (defaults to the configured one)
        #[arg(long)]
        api_key: Option<String>,

        /// Endpoint to test (defaults to the configured one)
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List entries
    List {
        #[arg(long, value_enum, default_value_t = SortMode::Recent)]
        sort: SortMode,

        /// Show repeat counts and lookup times (defaults to the setting)
        #[arg(long)]
        advanced: bool,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every entry
    Clear {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Write the history to bainian_history_export_<date>.json
    Export {
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Merge entries from an exported file; existing words are kept
    Import { file: PathBuf },
}

#[derive(Subcommand)]
pub enum EditorCommands {
    /// Print the history as editable JSON
    Load,

    /// Re-indent a JSON file
    Format {
        file: PathBuf,

        /// Rewrite the file in place
        #[arg(long)]
        write: bool,
    },

    /// Filter entries by word or explanation
    Search {
        query: String,

        /// Search this file instead of the stored history
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Replace the whole history with an edited file
    Save { file: PathBuf },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print current settings (the key is masked)
    Show,

    /// Change settings
    Set {
        #[arg(long)]
        api_key: Option<String>,

        /// Blank restores the default endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Blank restores the default prompt
        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        advanced_history: Option<bool>,
    },
}
