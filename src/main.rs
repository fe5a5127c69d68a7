//! Webhook inbox server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Sender POST /webhooks/{id}
//!         │
//!         ▼
//!     ┌──────────┐   ┌───────────────┐   ┌───────────────┐   ┌────────────┐
//!     │  http    │──▶│ security      │──▶│ ingest        │──▶│ storage    │
//!     │  server  │   │ rate limit    │   │ normalize     │   │ endpoints  │
//!     │          │   │ payload guard │   │ resolve       │   │ events     │
//!     └──────────┘   └───────────────┘   └───────────────┘   └─────┬──────┘
//!                                                                   │
//!     Operator ──▶ admin (management API, :8081) ───────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use webhook_inbox::config::{load_config, InboxConfig};
use webhook_inbox::lifecycle;
use webhook_inbox::observability::logging;

#[derive(Parser)]
#[command(name = "webhook-inbox")]
#[command(about = "Receive and record webhooks on per-endpoint URLs", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "INBOX_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => InboxConfig::default(),
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        admin_enabled = config.admin.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "webhook-inbox starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
