//! munin-node - serves plugin metrics to a munin collector.
//!
//! Listens on the configured address and answers the munin node protocol
//! until interrupted.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use munin_node::{parse_address_list, uptime_plugin, MuninServer, NodeConfig};
use munin_plugin::{Plugin, StaticPluginProvider};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "munin-node")]
#[command(about = "Munin node daemon")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "MUNIN_NODE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "MUNIN_NODE_LISTEN")]
    listen: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long, env = "MUNIN_NODE_PORT")]
    port: Option<u16>,

    /// Host name reported to the collector
    #[arg(long, env = "MUNIN_NODE_HOSTNAME")]
    hostname: Option<String>,

    /// Allowed remote addresses, separated by spaces, commas or semicolons
    #[arg(long, env = "MUNIN_NODE_ALLOW_FROM")]
    allow_from: Option<String>,
}

impl Cli {
    /// Loads the config file, if any, and applies command line overrides.
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)?,
            None => NodeConfig::new(),
        };

        if let Some(listen) = self.listen {
            config = config.with_listen(listen);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(hostname) = self.hostname {
            config = config.with_hostname(hostname);
        }
        if let Some(allow_from) = self.allow_from {
            config = config.with_allow_from(parse_address_list(&allow_from));
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let started = Instant::now();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    info!("Starting munin node on {}", config.bind_addr());
    info!("  Host name:  {}", config.hostname);
    info!("  Allow from: {:?}", config.allow_from);

    let uptime: Arc<dyn Plugin> = Arc::new(uptime_plugin(&config.hostname, started)?);
    let provider = Arc::new(StaticPluginProvider::new(vec![uptime]));
    info!("  Plugins:    {}", provider.len());
    let server = MuninServer::new(config, provider);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    // Run until error or shutdown
    if let Err(e) = server.run(&cancel, false).await {
        error!("munin node error: {}", e);
        std::process::exit(1);
    }

    info!("munin node stopped");
    Ok(())
}

/// Cancels `cancel` on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating shutdown"),
        () = terminate => info!("received SIGTERM, initiating shutdown"),
    }

    cancel.cancel();
}
