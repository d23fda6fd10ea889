use clap::{Parser, Subcommand};

/// Content Tokens: per-language {{Token}} substitution for served content
#[derive(Parser)]
#[command(name = "content-tokens", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to bind (overrides CONTENT_TOKENS_PORT)
        #[arg(short, long, env = "CONTENT_TOKENS_PORT")]
        port: Option<u16>,
    },

    /// Manage tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Run substitution on a piece of text
    Preview {
        #[arg(long)]
        text: String,
        #[arg(long)]
        language: Option<String>,
    },

    /// Import (upsert) tokens from a YAML or JSON document
    Import {
        /// Path to the document; `.json` files are parsed as JSON
        file: String,
    },

    /// Print every token as a YAML or JSON document
    Export {
        #[arg(long, default_value = "yaml")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// List tokens, optionally filtered by language
    List {
        #[arg(long)]
        language: Option<String>,
    },
    /// Show the effective token for a name
    Get {
        name: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// Create or update a token
    Set {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        value: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Update this record instead of creating a new one
        #[arg(long)]
        id: Option<String>,
    },
    /// Delete a token by id
    Delete { id: String },
}
