mod config;
mod terminal;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use clap::Parser;
use config::Config;
use reader_sync::{
    Collaborators, FileStore, HttpDocumentSource, HttpProgressService, ProgressStore,
    ReaderError, ReaderSession, SessionOptions, SyncConfig,
};
use terminal::{Command, LogNotifier, TerminalView, parse_command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type ReaderResult<T> = anyhow::Result<T>;

/// Read a paginated document from the terminal, syncing progress as you go.
#[derive(Debug, Parser)]
#[command(name = "reader", version)]
struct Args {
    /// Identity of the document in the progress service
    document_id: String,
    /// URL of the document (metadata at the URL, pages under /pages/N)
    locator: String,
    /// Open at this page instead of the stored position
    #[arg(long)]
    page: Option<u32>,
}

#[tokio::main]
async fn main() -> ReaderResult<()> {
    // Initialize tracing (logs) on stderr so it does not interleave with pages.
    let default_filter = format!(
        "{}=info,reader=info,reqwest=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting reader");

    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let args = Args::parse();
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!(e));
    }

    let source = HttpDocumentSource::new().context("Failed to build document client")?;
    let remote = HttpProgressService::new(&config.progress_url)
        .context("Failed to build progress client")?
        .with_api_key(&config.api_key);
    let store = ProgressStore::new(Arc::new(FileStore::open(&config.store_path)));
    tracing::info!(
        progress_url = %config.progress_url,
        store = %config.store_path.display(),
        has_api_key = !config.api_key.is_empty(),
        "configured reader"
    );

    let view = Arc::new(TerminalView);
    let collaborators = Collaborators {
        source: Arc::new(source),
        remote: Arc::new(remote),
        store,
        notifier: Arc::new(LogNotifier),
        surface: view.clone(),
        controls: view,
    };
    let options = SessionOptions {
        credentials: config.document_credentials(),
        page_hint: args.page,
        sync: SyncConfig {
            debounce: config.sync_debounce,
        },
    };

    let session = match ReaderSession::open(&args.document_id, &args.locator, collaborators, options).await {
        Ok(session) => session,
        Err(e @ ReaderError::Auth(_)) => {
            return Err(anyhow::Error::new(e).context("Access denied; sign in again and retry"));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("Failed to open {}", args.locator)));
        }
    };

    let result = run(&session).await;
    session.close().await;
    result
}

async fn run(session: &Arc<ReaderSession>) -> ReaderResult<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.bind_input(rx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        match parse_command(&line) {
            Some(Command::Input(input)) => {
                if tx.send(input).is_err() {
                    break;
                }
            }
            Some(Command::Quit) => break,
            Some(Command::Unknown(cmd)) => println!("? unknown command: {}", cmd),
            None => {}
        }
    }
    Ok(())
}
