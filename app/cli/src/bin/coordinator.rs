//! `distbuild-coordinator` — the worker directory daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use distbuild_coordinator::CoordinatorService;
use distbuild_transport::TransportSettings;
use distbuild_transport::serve;
use tokio::net::TcpListener;
use tracing::info;

use distbuild_cli::logging;

/// Coordinator: tracks live tool servers and fans snapshots out.
#[derive(Debug, Parser)]
#[command(name = "distbuild-coordinator", version, about)]
struct Args {
    /// Config file (default: $DISTBUILD_CONFIG or ~/.distbuild.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(long, value_name = "PORT")]
    listen_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");
    let args = Args::parse();

    let config_path = distbuild_config::find_config(args.config.as_deref());
    let config = distbuild_config::load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let mut server_config = config.coordinator_server.clone().unwrap_or_default();
    if let Some(port) = args.listen_port {
        server_config.listen_port = port;
    }
    if server_config.listen_port == 0 {
        bail!("no coordinator listen port configured");
    }

    let host = if server_config.listen_host.is_empty() {
        "0.0.0.0"
    } else {
        &server_config.listen_host
    };
    let addr = format!("{host}:{}", server_config.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "coordinator listening");

    let service = Arc::new(CoordinatorService::new());
    tokio::select! {
        _ = serve(listener, TransportSettings::default(), service) => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
