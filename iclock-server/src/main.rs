// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  iclock-relay: attendance terminal relay
//
//  Devices:  GET /iclock/getrequest, POST /iclock/cdata
//  Journal:  append-only raw exchange log
//  ERP:      optional one-shot forward of every data push
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use anyhow::Context;
use clap::Parser;
use iclock_core::{RelayConfig, RelayError};
use iclock_observability::Journal;
use iclock_proxy::Listener;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "iclock-relay", version, about = "Attendance terminal relay with ERP forwarding")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/iclock-relay/relay.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Listen port; overrides the port in `listener.addr`
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "iclock-relay starting");

    // ── Config ──
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults and environment");
    }
    let mut config = RelayConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.set_listen_port(port);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: RelayConfig) -> anyhow::Result<()> {
    // ── Journal ──
    let journal = Journal::open(&config.journal.path)
        .with_context(|| format!("opening journal {}", config.journal.path.display()))?;
    let journal = Arc::new(journal);

    // ── Listener ──
    let listener = match Listener::start(&config, Arc::clone(&journal)).await {
        Ok(listener) => listener,
        Err(e @ RelayError::Bind { .. }) => {
            error!(
                addr = %config.listener.addr,
                error = %e,
                "Failed to bind; choose another port and update the device"
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if config.erp.enabled {
        info!(url = %config.erp.url, "Forwarding data pushes to the ERP");
    }
    info!(addr = %listener.local_addr(), "iclock-relay is ready");

    // ── Graceful shutdown: wait for SIGTERM/SIGINT ──
    shutdown_signal().await;
    info!("Shutdown signal received, stopping...");

    listener.stop().await;
    if let Err(e) = journal.flush() {
        error!(error = %e, "Failed to flush journal");
    }
    info!("iclock-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["iclock-relay"]);
        assert_eq!(cli.config, PathBuf::from("/etc/iclock-relay/relay.yaml"));
        assert_eq!(cli.log_level, "info");
        assert!(cli.port.is_none());
    }

    #[test]
    fn cli_port_override() {
        let cli = Cli::parse_from(["iclock-relay", "--port", "5005", "-c", "relay.yaml"]);
        assert_eq!(cli.port, Some(5005));
        assert_eq!(cli.config, PathBuf::from("relay.yaml"));
    }

    #[test]
    fn cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["iclock-relay", "--port", "70000"]).is_err());
    }
}
