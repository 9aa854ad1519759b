//! TabVolume - per-tab browser volume coordinator
//!
//! Native messaging host entry point plus maintenance commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info, warn};

use tabvolume::cli::{Cli, Command, OutputFormat, get_log_path, normalize_args, origin_extension_id};
use tabvolume::config::Config;
use tabvolume::coordinator::Coordinator;
use tabvolume::domain::VolumeRecord;
use tabvolume::domain::validate::normalize_page_address;
use tabvolume::ipc::{BridgePort, NativeHost};
use volumestore::{KvStore, SqliteStore, StoreKey};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                // stdout belongs to the browser pipe
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Host { launch_args }) => {
            debug!(?launch_args, "main: matched Host command");
            cmd_host(config, &launch_args).await
        }
        None => {
            debug!("main: no command specified, running host");
            cmd_host(config, &[]).await
        }
        Some(Command::Records { format }) => {
            debug!(%format, "main: matched Records command");
            cmd_records(&config, format).await
        }
        Some(Command::Config) => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
        Some(Command::Forget { address, tabs }) => {
            debug!(?address, tabs, "main: matched Forget command");
            cmd_forget(&config, address.as_deref(), tabs).await
        }
    }
}

/// Run the native messaging host until the browser disconnects
async fn cmd_host(mut config: Config, launch_args: &[String]) -> Result<()> {
    debug!("cmd_host: called");
    if config.coordinator.extension_id.is_empty()
        && let Some(id) = origin_extension_id(launch_args)
    {
        info!(extension_id = %id, "Accepting messages from launching extension");
        config.coordinator.extension_id = id;
    }

    let store = SqliteStore::open(&config.storage.db_path)
        .context(format!("Failed to open store at {}", config.storage.db_path.display()))?;

    let (port, out_rx) = BridgePort::new();
    let mut coordinator = Coordinator::new(
        config.coordinator.clone(),
        config.delivery.clone(),
        Arc::new(store),
        port.clone(),
    );
    if let Err(e) = coordinator.init().await {
        warn!(error = %e, "Failed to hydrate volume state, starting empty");
    }

    let (handle, join) = coordinator.spawn();
    let host = NativeHost::new(handle, port, out_rx);
    let result = host.run(tokio::io::stdin(), tokio::io::stdout()).await;

    join.await.context("Coordinator task failed")?;
    result.context("Native host failed")
}

/// Print stored records
async fn cmd_records(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_records: called");
    let store = SqliteStore::open(&config.storage.db_path).context("Failed to open store")?;
    let entries = store.list_entries().await.context("Failed to read records")?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = entries
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "key": entry.key,
                        "record": VolumeRecord::from_stored(&entry.value),
                        "updatedAt": entry.updated_at.to_rfc3339(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No stored records");
                return Ok(());
            }
            for entry in &entries {
                let record = VolumeRecord::from_stored(&entry.value);
                let key = match StoreKey::parse(&entry.key) {
                    Some(StoreKey::Tab(_)) => entry.key.cyan(),
                    Some(StoreKey::Address(_)) => entry.key.green(),
                    None => entry.key.dimmed(),
                };
                let mute = if record.muted { "muted".red() } else { "".normal() };
                println!(
                    "{}  volume={} previous={} {}  {}",
                    key,
                    record.volume,
                    record.previous_volume,
                    mute,
                    entry.updated_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
                );
            }
        }
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}

/// Delete an address record and/or stale tab records
async fn cmd_forget(config: &Config, address: Option<&str>, tabs: bool) -> Result<()> {
    debug!(?address, tabs, "cmd_forget: called");
    if address.is_none() && !tabs {
        return Err(eyre!("Nothing to forget: give a page address or --tabs"));
    }

    let store = SqliteStore::open(&config.storage.db_path).context("Failed to open store")?;

    if let Some(address) = address {
        let normalized = normalize_page_address(address).ok_or_else(|| eyre!("Not a remembered page address: {}", address))?;
        let key = StoreKey::Address(normalized).to_string();
        if store.remove(&key).await? {
            println!("Forgot {}", key.green());
        } else {
            println!("No record for {}", key);
        }
    }

    if tabs {
        let mut removed = 0;
        for entry in store.list_entries().await? {
            if matches!(StoreKey::parse(&entry.key), Some(StoreKey::Tab(_))) && store.remove(&entry.key).await? {
                removed += 1;
            }
        }
        println!("Forgot {} tab records", removed);
    }
    Ok(())
}
