//! encsvcd: encryption service daemon
//!
//! Usage:
//!   encsvcd [--config /etc/encsvc/config.toml] [--listen 0.0.0.0:8000]

use anyhow::Result;
use clap::{Parser, ValueEnum};
use encsvc_core::config::EncsvcConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "encsvcd", version, about = "Encryption service daemon")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(
        long,
        short = 'c',
        env = "ENCSVC_CONFIG",
        default_value = "/etc/encsvc/config.toml"
    )]
    config: PathBuf,

    /// Override server.listen from the config file
    #[arg(long, env = "ENCSVC_LISTEN")]
    listen: Option<String>,

    /// Override storage.root from the config file
    #[arg(long, env = "ENCSVC_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to server.log_level
    #[arg(long, env = "ENCSVC_LOG")]
    log: Option<String>,

    /// Log format; defaults to server.log_format
    #[arg(long, env = "ENCSVC_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is read before logging so its log settings apply; a missing
    // file is reported once the subscriber exists.
    let config_present = cli.config.exists();
    let mut config = if config_present {
        EncsvcConfig::from_file(&cli.config)?
    } else {
        EncsvcConfig::default()
    };

    let level = cli.log.clone().unwrap_or_else(|| config.server.log_level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.server.log_format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    });
    init_logging(&level, &format);

    if !config_present {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(root) = cli.storage_root {
        config.storage.root = root;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "encsvcd starting"
    );

    encsvcd::daemon::run(config).await
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
