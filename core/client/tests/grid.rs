//! Full-fabric test: coordinator, worker and client wired together the way
//! the binaries wire them, with discovery through the coordinator instead
//! of an injected worker list.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use distbuild_client::RemoteToolClient;
use distbuild_config::ClientConfig;
use distbuild_config::CoordinatorSettings;
use distbuild_config::Redundance;
use distbuild_config::ToolDefinition;
use distbuild_config::ToolchainDialect;
use distbuild_config::WorkerConfig;
use distbuild_coordinator::CoordinatorService;
use distbuild_executor::LocalExecutor;
use distbuild_invocation::InvocationRewriter;
use distbuild_invocation::ToolCommandline;
use distbuild_invocation::ToolId;
use distbuild_invocation::parser_for;
use distbuild_transport::TransportSettings;
use distbuild_transport::serve;
use distbuild_worker::ToolServer;
use distbuild_worker::WorkerService;
use tokio::net::TcpListener;

fn tools() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        id: "append".to_string(),
        names: vec!["/bin/sh".to_string()],
        dialect: ToolchainDialect::UpdateFile,
        version: Some("1.0".to_string()),
        ..Default::default()
    }]
}

fn coordinator_settings(addr: &str) -> CoordinatorSettings {
    CoordinatorSettings {
        enabled: true,
        hosts: vec![addr.to_string()],
        port: 0,
        redundance: Redundance::All,
        send_info_interval: Duration::from_millis(200),
    }
}

fn invocation(script: &str) -> ToolCommandline {
    let mut invocation = ToolCommandline::new(
        ToolId::new("append", "/bin/sh"),
        ToolchainDialect::UpdateFile,
        vec!["-c".to_string(), script.to_string(), "unit.txt".to_string()],
    );
    parser_for(ToolchainDialect::UpdateFile).derive(&mut invocation);
    invocation
}

#[tokio::test]
async fn test_discovery_dispatch_and_result() {
    // Coordinator.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let coordinator_addr = listener.local_addr().unwrap().to_string();
    let coordinator_task = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::new(CoordinatorService::new()),
    ));

    // Worker, registering with the coordinator. The advertised host must
    // be routable for the client, so pin it to loopback.
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().join("scratch"));
    let rewriter = InvocationRewriter::new(tools());
    let versions = BTreeMap::from([("append".to_string(), "1.0".to_string())]);
    let service = Arc::new(WorkerService::new(
        WorkerConfig {
            server_name: "127.0.0.1".to_string(),
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            thread_count: 2,
            host_allowlist: Vec::new(),
            compression: Default::default(),
            use_client_compression: true,
            coordinator: Default::default(),
        },
        executor,
        rewriter,
        versions,
    ));
    let worker = ToolServer::start(
        service,
        "127.0.0.1",
        0,
        Default::default(),
        TransportSettings::default(),
    )
    .await
    .unwrap();
    let worker_port = worker.local_addr().port();

    // The worker's advertisement carries its configured port, which is 0
    // when the test binds ephemerally; publish an amended record with the
    // real port through the same publisher channel the daemon uses.
    let amended = {
        let mut status = worker.service().status();
        status.port = worker_port;
        status
    };
    let amend_client = distbuild_coordinator::CoordinatorClient::new(
        coordinator_settings(&coordinator_addr),
        TransportSettings::default(),
    );
    amend_client.set_status_source(Box::new(move || amended.clone()));
    amend_client.start();

    // Client discovers through the coordinator.
    let client = RemoteToolClient::new(
        ClientConfig {
            client_id: "grid-test".to_string(),
            queue_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            coordinator: coordinator_settings(&coordinator_addr),
            ..Default::default()
        },
        TransportSettings::default(),
        BTreeMap::from([("append".to_string(), "1.0".to_string())]),
    );
    client.start();

    let outcome = client
        .invoke_tool(&invocation("echo via-grid >> \"$0\""), b"seed\n")
        .await;
    assert!(outcome.success, "stdout: {}", outcome.std_out);
    assert_eq!(
        String::from_utf8_lossy(&outcome.file_data),
        "seed\nvia-grid\n"
    );
    assert_eq!(outcome.worker, Some(("127.0.0.1".to_string(), worker_port)));

    client.stop();
    amend_client.stop();
    worker.stop();
    coordinator_task.abort();
}

#[tokio::test]
async fn test_worker_restart_recovers_via_new_snapshot() {
    // Coordinator only; the client waits for a worker to appear within its
    // queue timeout, proving the pending-request path reacts to snapshot
    // arrivals rather than failing fast.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let coordinator_addr = listener.local_addr().unwrap().to_string();
    let coordinator_task = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::new(CoordinatorService::new()),
    ));

    let client = RemoteToolClient::new(
        ClientConfig {
            client_id: "late-worker".to_string(),
            queue_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            coordinator: coordinator_settings(&coordinator_addr),
            ..Default::default()
        },
        TransportSettings::default(),
        BTreeMap::from([("append".to_string(), "1.0".to_string())]),
    );
    client.start();

    let invoke = {
        let invocation = invocation("echo late >> \"$0\"");
        tokio::spawn(async move { client.invoke_tool(&invocation, b"").await })
    };

    // Bring the worker up after the invocation is already pending.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let tmp = tempfile::tempdir().unwrap();
    let executor = LocalExecutor::new(2, tmp.path().join("scratch"));
    let service = Arc::new(WorkerService::new(
        WorkerConfig {
            server_name: "127.0.0.1".to_string(),
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            thread_count: 2,
            host_allowlist: Vec::new(),
            compression: Default::default(),
            use_client_compression: true,
            coordinator: Default::default(),
        },
        executor,
        InvocationRewriter::new(tools()),
        BTreeMap::from([("append".to_string(), "1.0".to_string())]),
    ));
    let worker = ToolServer::start(
        service,
        "127.0.0.1",
        0,
        Default::default(),
        TransportSettings::default(),
    )
    .await
    .unwrap();
    let amended = {
        let mut status = worker.service().status();
        status.port = worker.local_addr().port();
        status
    };
    let publisher = distbuild_coordinator::CoordinatorClient::new(
        coordinator_settings(&coordinator_addr),
        TransportSettings::default(),
    );
    publisher.set_status_source(Box::new(move || amended.clone()));
    publisher.start();

    let outcome = invoke.await.unwrap();
    assert!(outcome.success, "stdout: {}", outcome.std_out);
    assert_eq!(String::from_utf8_lossy(&outcome.file_data), "late\n");

    publisher.stop();
    worker.stop();
    coordinator_task.abort();
}
