//! `confide` — inspect stored conversations.

mod render;

use confide_core::SessionKey;
use confide_session::{FileConversationStore, RecordCodec, ReportingAggregator, StoreConfig};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "confide.toml";

#[derive(Parser)]
#[command(name = "confide", about = "Confide — inspect stored agent conversations")]
struct Cli {
    /// Path to config file (defaults to ./confide.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Conversation directory (overrides config and CONFIDE_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every stored conversation, most recent first
    List,
    /// Show all conversations of one participant
    Participant {
        /// Participant identifier
        id: String,
    },
    /// Show a single conversation
    Show {
        /// Participant identifier
        participant: String,
        /// Conversation identifier
        conversation: String,
    },
    /// Corpus-wide statistics
    Stats,
}

#[derive(Deserialize, Default)]
struct ConfideConfig {
    #[serde(default)]
    store: StoreConfig,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<ConfideConfig> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(raw) => {
            debug!(config = %path.display(), "config loaded");
            Ok(toml::from_str(&raw)?)
        }
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            Ok(ConfideConfig::default())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = load_config(cli.config.as_deref()).await?;
    if let Some(dir) = std::env::var_os("CONFIDE_DATA_DIR") {
        config.store.data_dir = PathBuf::from(dir);
    }
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }
    info!(data_dir = %config.store.data_dir.display(), "opening conversation store");

    let store = Arc::new(FileConversationStore::from_config(&config.store).await?);
    let reports = ReportingAggregator::new(store);
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::List => {
            let listing = reports.list_all().await?;
            if cli.json {
                serde_json::to_writer_pretty(&mut stdout, &listing.sessions)?;
                writeln!(stdout)?;
            } else {
                write!(stdout, "{}", render::listing(&listing))?;
            }
        }
        Commands::Participant { id } => {
            let records = reports.list_by_participant(&id).await?;
            if records.is_empty() {
                anyhow::bail!("No conversations found for participant: {id}");
            }
            if !cli.json {
                writeln!(stdout, "Found {} conversation(s) for {id}:", records.len())?;
            }
            for record in &records {
                if cli.json {
                    stdout.write_all(&RecordCodec::encode(record)?)?;
                } else {
                    write!(stdout, "\n{}", render::conversation(record))?;
                }
            }
        }
        Commands::Show {
            participant,
            conversation,
        } => {
            let key = SessionKey::new(participant, conversation)?;
            let Some(record) = reports.find(&key).await? else {
                anyhow::bail!("Conversation not found: {key}");
            };
            if cli.json {
                stdout.write_all(&RecordCodec::encode(&record)?)?;
            } else {
                write!(stdout, "{}", render::conversation(&record))?;
            }
        }
        Commands::Stats => {
            let stats = reports.aggregate_statistics().await?;
            if cli.json {
                serde_json::to_writer_pretty(&mut stdout, &stats)?;
                writeln!(stdout)?;
            } else {
                write!(stdout, "{}", render::stats(&stats))?;
            }
        }
    }

    Ok(())
}
