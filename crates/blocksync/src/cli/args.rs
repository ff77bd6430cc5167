//! Clap argument definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blocksync")]
#[command(about = "Create, extend and read block-tree documents on a sync server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace id (overrides the configured one)
    #[arg(short, long, global = true)]
    pub workspace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a document and register it in the workspace
    Create {
        /// Document title
        title: String,

        /// Initial paragraph
        #[arg(short, long)]
        content: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Append a block, described as a JSON request
    ///
    /// Example: '{"docId": "abc", "type": "heading", "level": 2, "text": "Intro"}'
    Append {
        /// JSON request; read from stdin when omitted or "-"
        request: Option<String>,

        /// Disable closed field-set checking unless the request sets "strict"
        #[arg(long)]
        lenient: bool,
    },

    /// Print a document's block tree
    Read {
        /// Document id
        doc_id: String,

        /// Print Markdown instead of JSON
        #[arg(short, long)]
        markdown: bool,
    },

    /// Remove a document from the workspace and delete it on the server
    Delete {
        /// Document id
        doc_id: String,
    },

    /// List the documents registered in the workspace
    List,

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration (credentials are masked)
    Show,

    /// Change configuration values
    Set {
        /// Sync server URL (http, https, ws or wss)
        #[arg(long)]
        server: Option<String>,

        #[arg(long)]
        workspace_id: Option<String>,

        /// Bearer token
        #[arg(long)]
        token: Option<String>,

        /// Raw Cookie header value
        #[arg(long)]
        cookie: Option<String>,

        #[arg(long)]
        client_version: Option<String>,

        #[arg(long)]
        connect_timeout_ms: Option<u64>,

        #[arg(long)]
        request_timeout_ms: Option<u64>,
    },

    /// Print the config file path
    Path,
}
