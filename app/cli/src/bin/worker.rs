//! `distbuild-worker` — the tool server daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use distbuild_executor::LocalExecutor;
use distbuild_invocation::InvocationRewriter;
use distbuild_transport::TransportSettings;
use distbuild_version::VersionChecker;
use distbuild_worker::ToolServer;
use distbuild_worker::WorkerService;
use tracing::info;

use distbuild_cli::logging;

/// Tool server: accepts compile jobs and runs them locally.
#[derive(Debug, Parser)]
#[command(name = "distbuild-worker", version, about)]
struct Args {
    /// Config file (default: $DISTBUILD_CONFIG or ~/.distbuild.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(long, value_name = "PORT")]
    listen_port: Option<u16>,

    /// Override the configured thread count.
    #[arg(long, value_name = "N")]
    threads: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");
    let args = Args::parse();

    let config_path = distbuild_config::find_config(args.config.as_deref());
    let config = distbuild_config::load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let Some(mut worker_config) = config.worker.clone() else {
        bail!("config {} has no [worker] section", config_path.display());
    };
    if let Some(port) = args.listen_port {
        worker_config.listen_port = port;
    }
    if let Some(threads) = args.threads {
        worker_config.thread_count = threads;
    }
    if config.tools.is_empty() {
        bail!("no [[tools]] configured; nothing to serve");
    }

    let executor = LocalExecutor::new(worker_config.thread_count as usize, config.temp_dir());
    let rewriter = InvocationRewriter::new(config.tools.clone());

    let checker = VersionChecker::new(executor.clone(), rewriter.clone());
    let versions = checker.determine_tool_versions(&[]).await;
    for (tool, version) in &versions {
        info!(%tool, version = %version, "serving tool");
    }

    let service = Arc::new(WorkerService::new(
        worker_config.clone(),
        executor,
        rewriter,
        versions,
    ));
    let server = ToolServer::start(
        service,
        &worker_config.listen_host,
        worker_config.listen_port,
        worker_config.coordinator.clone(),
        TransportSettings::default(),
    )
    .await?;

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    server.stop();
    Ok(())
}
