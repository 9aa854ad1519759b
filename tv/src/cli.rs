//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const SUBCOMMANDS: &[&str] = &["host", "records", "config", "forget", "help"];
const GLOBAL_FLAGS: &[&str] = &["-c", "--config", "--log-level", "-h", "--help", "-V", "--version"];
const EXTENSION_ORIGIN_SCHEME: &str = "chrome-extension://";

/// TabVolume - per-tab browser volume coordinator
#[derive(Debug, Parser)]
#[command(
    name = "tvd",
    about = "Per-tab volume coordinator for the browser extension",
    version,
    after_help = "Logs are written to: ~/.local/share/tabvolume/logs/tvd.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", global = true, help = "Log level: trace, debug, info, warn, error")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the native messaging host on stdio (default when launched by the browser)
    Host {
        /// Arguments the browser passes at launch (origin, parent window)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        launch_args: Vec<String>,
    },

    /// Show stored volume records
    Records {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    Config,

    /// Delete stored records
    Forget {
        /// Page address whose remembered volume should be dropped
        address: Option<String>,

        /// Also drop every tab-scoped record left from earlier sessions
        #[arg(long)]
        tabs: bool,
    },
}

/// Output format for the records command
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Route a browser launch to the `host` subcommand
///
/// Browsers start native hosts with their own positional arguments (the
/// caller's origin, a parent window handle). Anything that is not a known
/// subcommand or global flag is treated as such a launch.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = args.into_iter().collect();
    if let Some(first) = args.get(1) {
        let flag = first.split('=').next().unwrap_or_default();
        let known = SUBCOMMANDS.contains(&first.as_str()) || GLOBAL_FLAGS.contains(&flag);
        if !known {
            args.insert(1, "host".to_string());
        }
    }
    args
}

/// Extension id from a `chrome-extension://<id>/` launch argument
pub fn origin_extension_id(launch_args: &[String]) -> Option<String> {
    launch_args.iter().find_map(|arg| {
        let id = arg.strip_prefix(EXTENSION_ORIGIN_SCHEME)?.trim_end_matches('/');
        (!id.is_empty()).then(|| id.to_string())
    })
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabvolume")
        .join("logs")
        .join("tvd.log")
}
