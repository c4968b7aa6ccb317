use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use distbuild_config::ClientConfig;
use distbuild_config::ReplacePattern;
use distbuild_config::ToolDefinition;
use distbuild_config::ToolchainDialect;
use distbuild_executor::LocalExecutor;
use distbuild_invocation::InvocationRewriter;
use distbuild_invocation::ToolCommandline;
use distbuild_invocation::ToolId;
use distbuild_worker::ToolServer;
use distbuild_worker::WorkerService;
use pretty_assertions::assert_eq;

use super::*;

fn append_tool() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        id: "append".to_string(),
        names: vec!["/bin/sh".to_string()],
        dialect: ToolchainDialect::UpdateFile,
        version: Some("1.0".to_string()),
        ..Default::default()
    }]
}

async fn start_worker(tmp: &tempfile::TempDir, threads: u16) -> (ToolServer, ToolServerInfo) {
    let executor = LocalExecutor::new(threads as usize, tmp.path().join("scratch"));
    let rewriter = InvocationRewriter::new(append_tool());
    let versions = BTreeMap::from([("append".to_string(), "1.0".to_string())]);
    let config = distbuild_config::WorkerConfig {
        server_name: "127.0.0.1".to_string(),
        listen_host: "127.0.0.1".to_string(),
        listen_port: 0,
        thread_count: threads,
        host_allowlist: Vec::new(),
        compression: Default::default(),
        use_client_compression: true,
        coordinator: Default::default(),
    };
    let service = Arc::new(WorkerService::new(config, executor, rewriter, versions));
    let server = ToolServer::start(
        service,
        "127.0.0.1",
        0,
        Default::default(),
        TransportSettings::default(),
    )
    .await
    .unwrap();

    let mut info = server.service().status();
    info.host = "127.0.0.1".to_string();
    info.port = server.local_addr().port();
    (server, info)
}

fn invocation(script: &str) -> ToolCommandline {
    let mut invocation = ToolCommandline::new(
        ToolId::new("append", "/bin/sh"),
        ToolchainDialect::UpdateFile,
        vec!["-c".to_string(), script.to_string(), "unit.txt".to_string()],
    );
    distbuild_invocation::parser_for(ToolchainDialect::UpdateFile).derive(&mut invocation);
    invocation
}

fn client_config() -> ClientConfig {
    ClientConfig {
        client_id: "test-client".to_string(),
        queue_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(10),
        invocation_attempts: 2,
        minimal_remote_tasks: 10,
        ..Default::default()
    }
}

fn expected_versions() -> BTreeMap<String, String> {
    BTreeMap::from([("append".to_string(), "1.0".to_string())])
}

#[tokio::test]
async fn test_invoke_happy_path() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, info) = start_worker(&tmp, 2).await;

    let client = RemoteToolClient::new(
        client_config(),
        TransportSettings::default(),
        expected_versions(),
    );
    client.set_workers(vec![info.clone()]);

    let outcome = client
        .invoke_tool(&invocation("echo remote >> \"$0\""), b"local-half\n")
        .await;
    assert!(outcome.success, "stdout: {}", outcome.std_out);
    assert_eq!(
        String::from_utf8_lossy(&outcome.file_data),
        "local-half\nremote\n"
    );
    assert!(outcome.execution_time > Duration::ZERO);
    assert_eq!(outcome.worker, Some(info.key()));
    server.stop();
}

#[tokio::test]
async fn test_remote_tool_failure_is_not_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, info) = start_worker(&tmp, 2).await;

    let client = RemoteToolClient::new(
        client_config(),
        TransportSettings::default(),
        expected_versions(),
    );
    client.set_workers(vec![info]);

    let started = std::time::Instant::now();
    let outcome = client
        .invoke_tool(&invocation("echo deterministic error >&2; exit 1"), b"x")
        .await;
    assert!(!outcome.success);
    assert!(outcome.std_out.contains("deterministic error"));
    // No second attempt: a deterministic failure returns promptly.
    assert!(started.elapsed() < Duration::from_secs(5));
    server.stop();
}

#[tokio::test]
async fn test_version_mismatch_never_dispatches() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, mut info) = start_worker(&tmp, 2).await;
    info.tool_versions
        .insert("append".to_string(), "2.0".to_string());

    let client = RemoteToolClient::new(
        client_config(),
        TransportSettings::default(),
        expected_versions(),
    );
    client.set_workers(vec![info]);

    let outcome = client.invoke_tool(&invocation("true"), b"x").await;
    assert!(!outcome.success);
    assert!(outcome.std_out.contains("no eligible tool server"));
    assert_eq!(outcome.worker, None);
    server.stop();
}

#[tokio::test]
async fn test_queue_timeout_when_saturated() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, mut info) = start_worker(&tmp, 2).await;
    // Advertise full saturation with a small backlog; the policy holds the
    // request below minimal_remote_tasks and the queue clock runs out.
    info.running_tasks = info.total_threads;
    info.queued_tasks = 1;

    let mut config = client_config();
    config.minimal_remote_tasks = 100;
    config.queue_timeout = Duration::from_millis(300);
    let client =
        RemoteToolClient::new(config, TransportSettings::default(), expected_versions());
    client.set_workers(vec![info]);

    let outcome = client.invoke_tool(&invocation("true"), b"x").await;
    assert!(!outcome.success);
    assert!(outcome.std_out.contains("queue timeout"));
    server.stop();
}

#[tokio::test]
async fn test_failover_to_second_worker() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, info) = start_worker(&tmp, 2).await;

    // A dead endpoint that advertises the same tool.
    let dead = ToolServerInfo {
        host: "127.0.0.1".to_string(),
        port: 1,
        total_threads: 64, // most free threads: selected first
        ..info.clone()
    };

    let client = RemoteToolClient::new(
        client_config(),
        TransportSettings::default(),
        expected_versions(),
    );
    client.set_workers(vec![dead, info.clone()]);

    let outcome = client
        .invoke_tool(&invocation("echo rescued >> \"$0\""), b"")
        .await;
    assert!(outcome.success, "stdout: {}", outcome.std_out);
    assert_eq!(outcome.worker, Some(info.key()));
    server.stop();
}

#[tokio::test]
async fn test_attempts_cap_is_respected() {
    let dead_a = ToolServerInfo {
        host: "127.0.0.1".to_string(),
        port: 1,
        total_threads: 4,
        tool_ids: vec!["append".to_string()],
        tool_versions: BTreeMap::from([("append".to_string(), "1.0".to_string())]),
        ..Default::default()
    };
    let dead_b = ToolServerInfo {
        port: 2,
        ..dead_a.clone()
    };
    let dead_c = ToolServerInfo {
        port: 3,
        ..dead_a.clone()
    };

    let client = RemoteToolClient::new(
        client_config(), // invocation_attempts = 2
        TransportSettings::default(),
        expected_versions(),
    );
    client.set_workers(vec![dead_a, dead_b, dead_c]);

    let outcome = client.invoke_tool(&invocation("true"), b"x").await;
    // Two attempts, both failed on connect; the third worker was never
    // tried and the error is the transport's, not a scheduling one.
    assert!(!outcome.success);
    assert!(outcome.std_out.contains("failed to connect"));
}

#[tokio::test]
async fn test_post_processing_rewrites_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, info) = start_worker(&tmp, 2).await;

    let mut config = client_config();
    config.post_process = vec![ReplacePattern {
        needle: "/builddir/".to_string(),
        replacement: "/src/".to_string(),
    }];
    let client =
        RemoteToolClient::new(config, TransportSettings::default(), expected_versions());
    client.set_workers(vec![info]);

    let outcome = client
        .invoke_tool(&invocation("true"), b"path=/builddir/foo.cpp\n")
        .await;
    assert!(outcome.success, "stdout: {}", outcome.std_out);
    assert_eq!(
        String::from_utf8_lossy(&outcome.file_data),
        "path=/src/foo.cpp\n"
    );
    server.stop();
}

#[test]
fn test_replace_bytes() {
    assert_eq!(replace_bytes(b"aXbXc", b"X", b"--"), b"a--b--c".to_vec());
    assert_eq!(replace_bytes(b"aaa", b"aa", b"b"), b"ba".to_vec());
    assert_eq!(replace_bytes(b"none", b"zz", b"y"), b"none".to_vec());
}
