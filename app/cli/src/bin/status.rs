//! `distbuild-status` — show the grid: workers, load, tool versions.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use distbuild_coordinator::CoordinatorClient;
use distbuild_executor::LocalExecutor;
use distbuild_invocation::InvocationRewriter;
use distbuild_protocol::FrameBody;
use distbuild_protocol::ToolServerInfo;
use distbuild_transport::Connection;
use distbuild_transport::TransportSettings;
use distbuild_version::VersionChecker;

use distbuild_cli::logging;
use distbuild_cli::status_writer::JsonWriter;
use distbuild_cli::status_writer::StatusWriter;
use distbuild_cli::status_writer::TextWriter;
use distbuild_cli::status_writer::find_conflicts;

/// Status tool: one snapshot of the grid, plus per-worker tool versions.
#[derive(Debug, Parser)]
#[command(name = "distbuild-status", version, about)]
struct Args {
    /// Config file (default: $DISTBUILD_CONFIG or ~/.distbuild.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit one JSON document instead of text.
    #[arg(long)]
    json: bool,

    /// Also probe and print this host's own tool versions.
    #[arg(long)]
    show_local_tools: bool,

    /// Only show tool servers whose host contains this substring.
    #[arg(value_name = "FILTER")]
    filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("warn");
    let args = Args::parse();

    let config_path = distbuild_config::find_config(args.config.as_deref());
    let config = distbuild_config::load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if !config.client.coordinator.enabled {
        bail!("no coordinator configured in {}", config_path.display());
    }

    let mut writer: Box<dyn StatusWriter> = if args.json {
        Box::new(JsonWriter::default())
    } else {
        Box::new(TextWriter)
    };
    let mut all_versions: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    if args.show_local_tools {
        let rewriter = InvocationRewriter::new(config.tools.clone());
        let executor = LocalExecutor::new(2, config.temp_dir());
        let checker = VersionChecker::new(executor, rewriter);
        let local = checker.determine_tool_versions(&[]).await;
        writer.tool_versions("localhost", &local);
        all_versions.insert("localhost".to_string(), local);
    }

    let coordinator = CoordinatorClient::new(
        config.client.coordinator.clone(),
        TransportSettings::default(),
    );
    coordinator.start();

    let snapshot = coordinator
        .request_snapshot_with_retry(config.client.request_timeout)
        .await;
    let Some(snapshot) = snapshot else {
        coordinator.stop();
        bail!("no coordinator answered");
    };
    coordinator.stop();

    if !snapshot.message.is_empty() {
        writer.message(&snapshot.message);
    }

    let workers: Vec<&ToolServerInfo> = snapshot
        .tool_servers
        .iter()
        .filter(|worker| match &args.filter {
            Some(filter) => worker.host.contains(filter),
            None => true,
        })
        .collect();

    for worker in &workers {
        writer.tool_server(worker);
        let endpoint = format!("{}:{}", worker.host, worker.port);
        match query_versions(&endpoint, config.client.request_timeout).await {
            Some(versions) => {
                writer.tool_versions(&endpoint, &versions);
                all_versions.insert(endpoint, versions);
            }
            None => {
                // Fall back to the advertised map when the worker will not
                // answer directly.
                writer.tool_versions(&endpoint, &worker.tool_versions);
                all_versions.insert(endpoint, worker.tool_versions.clone());
            }
        }
    }

    writer.conflicts(&find_conflicts(&all_versions));
    writer.finish();

    if workers.is_empty() && args.filter.is_some() {
        bail!("no tool server matches the filter");
    }
    Ok(())
}

/// Ask one worker for its probed versions over the wire.
async fn query_versions(
    endpoint: &str,
    timeout: Duration,
) -> Option<BTreeMap<String, String>> {
    let connection = Connection::connect(endpoint, TransportSettings::default(), None)
        .await
        .ok()?;
    let frame = connection
        .request(FrameBody::ToolsVersionRequest, timeout)
        .await
        .ok()?;
    match frame.body {
        FrameBody::ToolsVersionResponse(response) => Some(response.versions),
        _ => None,
    }
}
