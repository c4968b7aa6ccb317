use std::sync::Arc;
use std::time::Duration;

use distbuild_protocol::ToolServerInfo;
use distbuild_transport::Connection;
use distbuild_transport::TransportSettings;
use distbuild_transport::serve;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use super::*;

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

async fn start_coordinator() -> (String, Arc<CoordinatorService>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let service = Arc::new(CoordinatorService::new());
    let task = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::clone(&service),
    ));
    (addr, service, task)
}

#[tokio::test]
async fn test_publication_replaces_record() {
    let (addr, service, server) = start_coordinator().await;
    let publisher = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    publisher
        .notify(FrameBody::WorkerStatus(worker("build-01", 1)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(service.snapshot().tool_servers.len(), 1);
    assert_eq!(service.snapshot().tool_servers[0].running_tasks, 1);

    // Same (host, port): replaced in place, not duplicated.
    publisher
        .notify(FrameBody::WorkerStatus(worker("build-01", 5)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(service.snapshot().tool_servers.len(), 1);
    assert_eq!(service.snapshot().tool_servers[0].running_tasks, 5);

    server.abort();
}

#[tokio::test]
async fn test_worker_evicted_when_connection_drops() {
    let (addr, service, server) = start_coordinator().await;

    {
        let publisher = Connection::connect(&addr, TransportSettings::default(), None)
            .await
            .unwrap();
        publisher
            .notify(FrameBody::WorkerStatus(worker("build-02", 0)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(service.snapshot().tool_servers.len(), 1);
        // Dropping the handle closes the socket.
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(service.snapshot().tool_servers.is_empty());
    server.abort();
}

#[tokio::test]
async fn test_subscribers_receive_coalesced_broadcasts() {
    let (addr, _service, server) = start_coordinator().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let push: distbuild_transport::PushHandler = Box::new(move |frame| {
        if let FrameBody::CoordinatorInfo(info) = frame.body {
            let _ = tx.send(info);
        }
    });
    let _subscriber = Connection::connect(&addr, TransportSettings::default(), Some(push))
        .await
        .unwrap();

    // The greeting snapshot is empty.
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first.tool_servers.is_empty());

    let publisher = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();
    // Rapid-fire publications inside one coalesce window.
    for running in 0..4 {
        publisher
            .notify(FrameBody::WorkerStatus(worker("build-03", running)))
            .unwrap();
    }

    // The next broadcast reflects the final state; intermediate states
    // were coalesced away.
    let mut last = None;
    while let Ok(Some(info)) =
        tokio::time::timeout(Duration::from_millis(400), rx.recv()).await
    {
        last = Some(info);
    }
    let last = last.unwrap();
    assert_eq!(last.tool_servers.len(), 1);
    assert_eq!(last.tool_servers[0].running_tasks, 3);

    server.abort();
}

#[tokio::test]
async fn test_one_shot_snapshot_request() {
    let (addr, _service, server) = start_coordinator().await;

    let publisher = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();
    publisher
        .notify(FrameBody::WorkerStatus(worker("build-04", 2)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let requester = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();
    let frame = requester
        .request(FrameBody::SnapshotRequest, Duration::from_secs(5))
        .await
        .unwrap();
    match frame.body {
        FrameBody::CoordinatorInfo(info) => {
            assert_eq!(info.tool_servers.len(), 1);
            assert_eq!(info.tool_servers[0].host, "build-04");
        }
        other => panic!("unexpected response: {other:?}"),
    }
    server.abort();
}
