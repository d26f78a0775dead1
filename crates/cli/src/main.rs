// volmon - catalog vs platform volume audit
// Exit codes are documented in exit_codes.rs

mod audit;
mod exit_codes;
mod notify;
mod profile;
mod report;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use volmon_api_client::ApiError;
use volmon_recon::{CatalogError, ReconError};
use volmon_config::ConfigError;

use exit_codes::{EXIT_CATALOG, EXIT_CONFIG, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "volmon")]
#[command(about = "Audit catalog volumes against the platform's inventory")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error, or a directive list).
    /// Audit warnings are printed regardless; this controls library logs.
    #[arg(long, global = true, env = "VOLMON_LOG", default_value = "error")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every project account's volumes and report the absent ones
    Audit(audit::AuditArgs),

    /// Show the resolved region profile with secrets redacted
    #[command(after_help = "\
Examples:
  volmon profile
  volmon profile --region prod --json")]
    Profile {
        /// Region profile to show (default: lab)
        #[arg(long)]
        region: Option<String>,

        /// Profile file (.toml, or a cloudmonkey INI config)
        #[arg(long, env = "VOLMON_CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Library crates log through `log`; the subscriber's log bridge picks that
/// up. Everything goes to stderr so stdout stays machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("error"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Audit(args) => audit::cmd_audit(args),
        Commands::Profile { region, config, json } => profile::cmd_profile(region, config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::NotFound { .. } => {
                Some("pass --config FILE or set VOLMON_CONFIG".to_string())
            }
            ConfigError::UnknownRegion(_) => {
                Some("run `volmon profile --region NAME` to check a region".to_string())
            }
            ConfigError::MissingOption { key, .. } if key == "secretkey" || key == "apikey" => {
                Some("keys may also come from VOLMON_API_KEY / VOLMON_SECRET_KEY".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }

    /// API client construction failures are profile problems.
    pub fn client(err: ApiError) -> Self {
        Self { code: EXIT_CONFIG, message: err.to_string(), hint: None }
    }

    pub fn catalog(err: CatalogError) -> Self {
        let hint = match &err {
            CatalogError::Connect(_) => {
                Some("check db_host, db_user, db_password (or db_path) for the region".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_CATALOG, message: err.to_string(), hint }
    }

    pub fn recon(err: ReconError) -> Self {
        match err {
            ReconError::Catalog(e) => {
                let mut out = Self::catalog(e);
                out.message = format!("entity discovery failed: {}", out.message);
                out
            }
        }
    }
}
