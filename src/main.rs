//! # corpus-chat CLI (`cchat`)
//!
//! The `cchat` binary wraps both sides of the streaming chat protocol:
//! it runs the server and, as a client, streams answers and manages the
//! document corpus over the server's REST API.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cchat init` | Create the SQLite database and run schema migrations |
//! | `cchat serve` | Start the HTTP server |
//! | `cchat chat "<prompt>"` | Stream an answer to the terminal |
//! | `cchat docs add <file>` | Add a document to the corpus |
//! | `cchat docs remove <id>` | Remove a document |
//! | `cchat docs clear --yes` | Remove all documents |
//! | `cchat docs stats` | Show corpus statistics |
//! | `cchat docs list` | List documents |
//! | `cchat sync` | Bulk-ingest the configured folder |
//!
//! ## Examples
//!
//! ```bash
//! cchat init
//! cchat serve &
//! cchat docs add ./notes/deployment.md
//! cchat chat "how do we deploy?" --grounded
//! cchat sync --dry-run
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use corpus_chat::{chat_cmd, config, db, docs_cmd, migrate, server, sync};

/// corpus-chat — a streamed, corpus-grounded chat client and server for
/// local document Q&A.
#[derive(Parser)]
#[command(
    name = "cchat",
    about = "corpus-chat — streamed, corpus-grounded chat over your own documents",
    version,
    long_about = "corpus-chat serves a language-model chat stream that can be grounded in a \
    local document corpus, and manages that corpus: add or remove documents over a REST API, \
    bulk-ingest folders, and stream answers to the terminal with live segmentation."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents/chunks tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Start the HTTP server.
    ///
    /// Serves the streaming chat endpoint and the document management API
    /// on the configured bind address.
    Serve,

    /// Stream an answer for a prompt.
    ///
    /// Opens a streaming request against the server and renders display
    /// units as they complete. Ctrl-C cancels the stream; already-rendered
    /// output is kept.
    Chat {
        /// The prompt to send.
        prompt: String,

        /// Ground the answer in the document corpus.
        #[arg(long)]
        grounded: bool,
    },

    /// Manage corpus documents via the server's REST API.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Bulk-ingest the configured sync folder.
    ///
    /// Scans the folder from the `[sync]` section, skips unchanged files
    /// by content hash, and prunes documents whose files disappeared.
    Sync {
        /// Show what would be ingested without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Document management subcommands.
#[derive(Subcommand)]
enum DocsAction {
    /// Add a text file as a document.
    Add {
        /// Path to the file to add.
        file: PathBuf,

        /// Document title (defaults to the file name).
        #[arg(long)]
        title: Option<String>,
    },

    /// Remove a document by id.
    Remove {
        /// Document id (as printed by `docs add` or `docs list`).
        id: String,
    },

    /// Remove all documents.
    Clear {
        /// Confirm the destructive operation.
        #[arg(long)]
        yes: bool,
    },

    /// Show document and chunk counts.
    Stats,

    /// List documents.
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Serve => server::run_server(&config).await,
        Commands::Chat { prompt, grounded } => chat_cmd::run_chat(&config, &prompt, grounded).await,
        Commands::Docs { action } => match action {
            DocsAction::Add { file, title } => docs_cmd::run_add(&config, &file, title).await,
            DocsAction::Remove { id } => docs_cmd::run_remove(&config, &id).await,
            DocsAction::Clear { yes } => docs_cmd::run_clear(&config, yes).await,
            DocsAction::Stats => docs_cmd::run_stats(&config).await,
            DocsAction::List => docs_cmd::run_list(&config).await,
        },
        Commands::Sync { dry_run, limit } => sync::run_sync(&config, dry_run, limit).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_init(config: &config::Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    println!("initialized database at {}", config.db.path.display());
    Ok(())
}
