//! Tessera administrative binary.

use anyhow::{Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::PathBuf;
use tessera_core::config::AppConfig;
use tessera_server::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tessera - trust metadata store and timestamp signer
#[derive(Parser, Debug)]
#[command(name = "tesserad")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "TESSERA_CONFIG",
        default_value = "config/tessera.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a new version of a role's metadata
    Publish {
        /// Repository name
        #[arg(long)]
        gun: String,
        /// Role name (root, targets, snapshot, timestamp, or a delegation)
        #[arg(long)]
        role: String,
        /// Version number; must exceed every stored version
        #[arg(long)]
        version: i64,
        /// File holding the serialized document
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the latest version of a role's metadata
    Get {
        #[arg(long)]
        gun: String,
        #[arg(long)]
        role: String,
    },
    /// Delete all metadata of a repository
    Delete {
        #[arg(long)]
        gun: String,
    },
    /// Print the repository's timestamp key, creating it if needed
    TimestampKey {
        #[arg(long)]
        gun: String,
    },
    /// Print the current signed timestamp, regenerating it if expired
    Timestamp {
        #[arg(long)]
        gun: String,
    },
    /// Check metadata store connectivity
    Check,
}

fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}, using defaults", path);
    }

    figment
        .merge(Env::prefixed("TESSERA_").split("__"))
        .extract()
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Tessera v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    let state = AppState::from_config(config).await?;

    match args.command {
        Command::Publish {
            gun,
            role,
            version,
            file,
        } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            state
                .metadata
                .write_version(&gun, &role, version, &data)
                .await
                .with_context(|| format!("failed to publish {gun}/{role} version {version}"))?;
            println!("published {gun}/{role} version {version} ({} bytes)", data.len());
        }
        Command::Get { gun, role } => {
            let record = state
                .metadata
                .read_latest_record(&gun, &role)
                .await
                .with_context(|| format!("failed to read {gun}/{role}"))?;
            tracing::info!(gun = %gun, role = %role, version = record.version, "Latest version");
            println!("{}", String::from_utf8_lossy(&record.data));
        }
        Command::Delete { gun } => {
            let removed = state
                .metadata
                .delete_repository(&gun)
                .await
                .with_context(|| format!("failed to delete {gun}"))?;
            println!("deleted {removed} record(s) for {gun}");
        }
        Command::TimestampKey { gun } => {
            let key = state
                .timestamps
                .get_or_create_timestamp_key(&gun)
                .await
                .with_context(|| format!("failed to get timestamp key for {gun}"))?;
            println!("key_id: {}", key.key_id());
            println!("algorithm: {}", key.algorithm());
            println!(
                "public: {}",
                base64::engine::general_purpose::STANDARD.encode(key.as_bytes())
            );
        }
        Command::Timestamp { gun } => {
            let data = state
                .timestamps
                .get_or_create_timestamp(&gun)
                .await
                .with_context(|| format!("failed to get timestamp for {gun}"))?;
            println!("{}", String::from_utf8_lossy(&data));
        }
        Command::Check => {
            state
                .metadata
                .health_check()
                .await
                .context("metadata health check failed")?;
            println!("ok");
        }
    }

    Ok(())
}
