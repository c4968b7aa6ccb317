use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use distbuild_config::ToolDefinition;
use distbuild_config::ToolchainDialect;
use distbuild_config::WorkerConfig;
use distbuild_executor::LocalExecutor;
use distbuild_invocation::InvocationRewriter;
use distbuild_protocol::CompressionInfo;
use distbuild_protocol::CompressionType;
use distbuild_protocol::RemoteToolRequest;
use distbuild_protocol::compress;
use distbuild_protocol::decompress;
use distbuild_transport::Connection;
use distbuild_transport::TransportSettings;
use pretty_assertions::assert_eq;

use super::*;
use crate::server::ToolServer;

fn test_tools() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        id: "append".to_string(),
        names: vec!["/bin/sh".to_string()],
        dialect: ToolchainDialect::UpdateFile,
        version: Some("1.0".to_string()),
        ..Default::default()
    }]
}

fn worker_config(use_client_compression: bool) -> WorkerConfig {
    WorkerConfig {
        server_name: "test-worker".to_string(),
        listen_host: "127.0.0.1".to_string(),
        listen_port: 0,
        thread_count: 2,
        host_allowlist: Vec::new(),
        compression: CompressionInfo::new(CompressionType::ZStd, 3),
        use_client_compression,
        coordinator: Default::default(),
    }
}

async fn start_worker(
    tmp: &tempfile::TempDir,
    use_client_compression: bool,
) -> (ToolServer, String) {
    let executor = LocalExecutor::new(2, tmp.path().join("scratch"));
    let rewriter = InvocationRewriter::new(test_tools());
    let mut versions = BTreeMap::new();
    versions.insert("append".to_string(), "1.0".to_string());
    let service = Arc::new(WorkerService::new(
        worker_config(use_client_compression),
        executor,
        rewriter,
        versions,
    ));
    let server = ToolServer::start(
        service,
        "127.0.0.1",
        0,
        Default::default(),
        TransportSettings::default(),
    )
    .await
    .unwrap();
    let addr = server.local_addr().to_string();
    (server, addr)
}

fn append_request(compression: CompressionInfo, script: &str) -> RemoteToolRequest {
    let payload = compress(b"line-one\n", compression).unwrap();
    RemoteToolRequest {
        client_id: "test-client".to_string(),
        session_id: 99,
        file_data: payload,
        args: vec!["-c".to_string(), script.to_string(), "unit.txt".to_string()],
        tool_id: "append".to_string(),
        compression,
    }
}

#[tokio::test]
async fn test_compile_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, addr) = start_worker(&tmp, true).await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let compression = CompressionInfo::new(CompressionType::Gzip, 6);
    let request = append_request(compression, "echo line-two >> \"$0\"");
    let frame = connection
        .request(
            FrameBody::RemoteToolRequest(request),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

    let FrameBody::RemoteToolResponse(response) = frame.body else {
        panic!("unexpected frame");
    };
    assert!(response.success, "stdout: {}", response.std_out);
    assert!(response.execution_time > Duration::ZERO);
    // Echo policy: the worker answered with the client's codec.
    assert_eq!(response.compression.codec, CompressionType::Gzip);
    let produced = decompress(&response.file_data, response.compression).unwrap();
    assert_eq!(String::from_utf8_lossy(&produced), "line-one\nline-two\n");

    // The pool went back to idle after the job.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.service().status().running_tasks, 0);
    server.stop();
}

#[tokio::test]
async fn test_worker_compression_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, addr) = start_worker(&tmp, false).await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let request = append_request(CompressionInfo::NONE, "true");
    let frame = connection
        .request(
            FrameBody::RemoteToolRequest(request),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
    let FrameBody::RemoteToolResponse(response) = frame.body else {
        panic!("unexpected frame");
    };
    assert!(response.success, "stdout: {}", response.std_out);
    // use_client_compression = false: the worker's own codec wins.
    assert_eq!(response.compression.codec, CompressionType::ZStd);
    server.stop();
}

#[tokio::test]
async fn test_tool_failure_is_a_response_not_a_disconnect() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, addr) = start_worker(&tmp, true).await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let request = append_request(
        CompressionInfo::NONE,
        "echo unit.txt:1:1: error: boom >&2; exit 1",
    );
    let frame = connection
        .request(
            FrameBody::RemoteToolRequest(request),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
    let FrameBody::RemoteToolResponse(response) = frame.body else {
        panic!("unexpected frame");
    };
    assert!(!response.success);
    assert!(response.file_data.is_empty());
    assert!(response.std_out.contains("error: boom"));

    // The connection survived; another request still works.
    let request = append_request(CompressionInfo::NONE, "echo fine >> \"$0\"");
    let frame = connection
        .request(
            FrameBody::RemoteToolRequest(request),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
    let FrameBody::RemoteToolResponse(response) = frame.body else {
        panic!("unexpected frame");
    };
    assert!(response.success);
    server.stop();
}

#[tokio::test]
async fn test_unknown_tool_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, addr) = start_worker(&tmp, true).await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let mut request = append_request(CompressionInfo::NONE, "true");
    request.tool_id = "msvc19".to_string();
    let frame = connection
        .request(
            FrameBody::RemoteToolRequest(request),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
    let FrameBody::RemoteToolResponse(response) = frame.body else {
        panic!("unexpected frame");
    };
    assert!(!response.success);
    assert!(response.std_out.contains("msvc19"));
    server.stop();
}

#[tokio::test]
async fn test_versions_answered() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, addr) = start_worker(&tmp, true).await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let frame = connection
        .request(FrameBody::ToolsVersionRequest, Duration::from_secs(5))
        .await
        .unwrap();
    let FrameBody::ToolsVersionResponse(response) = frame.body else {
        panic!("unexpected frame");
    };
    assert_eq!(
        response.versions.get("append").map(String::as_str),
        Some("1.0")
    );
    server.stop();
}

#[tokio::test]
async fn test_status_reports_configured_shape() {
    let tmp = tempfile::tempdir().unwrap();
    let (server, _addr) = start_worker(&tmp, true).await;
    let status = server.service().status();
    assert_eq!(status.host, "test-worker");
    assert_eq!(status.total_threads, 2);
    assert_eq!(status.tool_ids, vec!["append"]);
    server.stop();
}
