use std::sync::Arc;
use std::time::Duration;

use distbuild_config::CoordinatorSettings;
use distbuild_config::Redundance;
use distbuild_protocol::FrameBody;
use distbuild_protocol::ToolServerInfo;
use distbuild_transport::Connection;
use distbuild_transport::TransportSettings;
use distbuild_transport::serve;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use super::*;
use crate::service::CoordinatorService;

fn worker(host: &str, running: u16) -> ToolServerInfo {
    ToolServerInfo {
        host: host.to_string(),
        port: 7767,
        total_threads: 8,
        running_tasks: running,
        queued_tasks: 0,
        tool_ids: vec!["gcc9".to_string()],
        tool_versions: std::collections::BTreeMap::new(),
        connected_clients: Vec::new(),
    }
}

async fn start_coordinator() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let service = Arc::new(CoordinatorService::new());
    let task = tokio::spawn(serve(listener, TransportSettings::default(), service));
    (addr, task)
}

fn settings_for(addrs: &[String], redundance: Redundance) -> CoordinatorSettings {
    CoordinatorSettings {
        enabled: true,
        hosts: addrs.to_vec(),
        port: 0, // every host entry carries its own port
        redundance,
        send_info_interval: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn test_all_mode_merges_coordinators() {
    let (addr1, server1) = start_coordinator().await;
    let (addr2, server2) = start_coordinator().await;

    // Coordinator 1 knows {A, B}; coordinator 2 knows {B, C} with a newer
    // record for B.
    let pub1 = Connection::connect(&addr1, TransportSettings::default(), None)
        .await
        .unwrap();
    pub1.notify(FrameBody::WorkerStatus(worker("worker-a", 1)))
        .unwrap();
    pub1.notify(FrameBody::WorkerStatus(worker("worker-b", 1)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let client = CoordinatorClient::new(
        settings_for(&[addr1.clone(), addr2.clone()], Redundance::All),
        TransportSettings::default(),
    );
    client.set_info_arrived(Box::new(move |info| {
        let _ = tx.send(info);
    }));
    client.start();

    // Let the client absorb coordinator 1's view first.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let pub2 = Connection::connect(&addr2, TransportSettings::default(), None)
        .await
        .unwrap();
    pub2.notify(FrameBody::WorkerStatus(worker("worker-b", 7)))
        .unwrap();
    pub2.notify(FrameBody::WorkerStatus(worker("worker-c", 2)))
        .unwrap();

    // Drain snapshots until the merge covers all three workers.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut merged = None;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Some(info)) if info.tool_servers.len() == 3 => {
                merged = Some(info);
                break;
            }
            Ok(Some(_)) => continue,
            _ => break,
        }
    }
    let merged = merged.expect("merge never covered all workers");

    let hosts: Vec<&str> = merged
        .tool_servers
        .iter()
        .map(|server| server.host.as_str())
        .collect();
    assert_eq!(hosts, vec!["worker-a", "worker-b", "worker-c"]);

    // B's record is the most recently received one.
    let b = merged
        .tool_servers
        .iter()
        .find(|server| server.host == "worker-b")
        .unwrap();
    assert_eq!(b.running_tasks, 7);

    client.stop();
    server1.abort();
    server2.abort();
}

#[tokio::test]
async fn test_any_mode_uses_first_reachable() {
    // First host refuses; the client must fall through to the live one.
    let (live, server) = start_coordinator().await;
    let addrs = vec!["127.0.0.1:1".to_string(), live.clone()];

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let client = CoordinatorClient::new(
        settings_for(&addrs, Redundance::Any),
        TransportSettings::default(),
    );
    client.set_info_arrived(Box::new(move |info| {
        let _ = tx.send(info);
    }));
    client.start();

    // The greeting snapshot from the live coordinator proves the fall
    // through happened.
    let info = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(info.tool_servers.is_empty());

    client.stop();
    server.abort();
}

#[tokio::test]
async fn test_publisher_reports_status() {
    let (addr, server) = start_coordinator().await;

    let client = CoordinatorClient::new(
        settings_for(&[addr.clone()], Redundance::All),
        TransportSettings::default(),
    );
    client.set_status_source(Box::new(|| worker("self-report", 3)));
    client.start();

    // An independent subscriber should see the published record.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let observer = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();
    let frame = observer
        .request(FrameBody::SnapshotRequest, Duration::from_secs(5))
        .await
        .unwrap();
    match frame.body {
        FrameBody::CoordinatorInfo(info) => {
            assert_eq!(info.tool_servers.len(), 1);
            assert_eq!(info.tool_servers[0].host, "self-report");
            assert_eq!(info.tool_servers[0].running_tasks, 3);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    client.stop();
    server.abort();
}
