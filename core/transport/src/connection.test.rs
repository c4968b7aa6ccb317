use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use distbuild_error::ErrorExt;
use distbuild_error::StatusCode;
use distbuild_protocol::CoordinatorInfo;
use distbuild_protocol::ToolsVersionResponse;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use super::*;
use crate::server::ConnectionCtx;
use crate::server::FrameHandler;
use crate::server::serve;

/// Answers version requests after an optional delay; can be told to stay
/// silent or to push a snapshot at connect time.
struct TestHandler {
    respond: bool,
    delay: Duration,
    push_on_connect: bool,
}

impl TestHandler {
    fn answering() -> Self {
        Self {
            respond: true,
            delay: Duration::ZERO,
            push_on_connect: false,
        }
    }
}

impl FrameHandler for TestHandler {
    fn on_frame(self: Arc<Self>, ctx: ConnectionCtx, frame: Frame) {
        if !self.respond {
            return;
        }
        let delay = self.delay;
        tokio::spawn(async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            let mut versions = BTreeMap::new();
            versions.insert("gcc9".to_string(), "9.3.0".to_string());
            ctx.send(Frame::new(
                frame.transaction_id,
                FrameBody::ToolsVersionResponse(ToolsVersionResponse { versions }),
            ));
        });
    }

    fn on_connected(&self, ctx: &ConnectionCtx) {
        if self.push_on_connect {
            ctx.send(Frame::notification(FrameBody::CoordinatorInfo(
                CoordinatorInfo {
                    tool_servers: Vec::new(),
                    message: "pushed".to_string(),
                },
            )));
        }
    }
}

async fn start_server(handler: TestHandler) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let task = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::new(handler),
    ));
    (addr, task)
}

#[tokio::test]
async fn test_request_response_round_trip() {
    let (addr, server) = start_server(TestHandler::answering()).await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let response = connection
        .request(FrameBody::ToolsVersionRequest, Duration::from_secs(5))
        .await
        .unwrap();
    match response.body {
        FrameBody::ToolsVersionResponse(versions) => {
            assert_eq!(versions.versions.get("gcc9").map(String::as_str), Some("9.3.0"));
        }
        other => panic!("unexpected response: {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn test_concurrent_requests_correlate() {
    let (addr, server) = start_server(TestHandler {
        respond: true,
        delay: Duration::from_millis(30),
        push_on_connect: false,
    })
    .await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let connection = connection.clone();
        handles.push(tokio::spawn(async move {
            connection
                .request(FrameBody::ToolsVersionRequest, Duration::from_secs(5))
                .await
        }));
    }
    for handle in handles {
        let frame = handle.await.unwrap().unwrap();
        assert!(matches!(frame.body, FrameBody::ToolsVersionResponse(_)));
    }
    server.abort();
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let (addr, server) = start_server(TestHandler {
        respond: false,
        delay: Duration::ZERO,
        push_on_connect: false,
    })
    .await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let error = connection
        .request(FrameBody::ToolsVersionRequest, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::Timeout);
    server.abort();
}

#[tokio::test]
async fn test_server_gone_fails_pending_with_connection_lost() {
    let (addr, server) = start_server(TestHandler {
        respond: false,
        delay: Duration::ZERO,
        push_on_connect: false,
    })
    .await;
    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let pending = {
        let connection = connection.clone();
        tokio::spawn(async move {
            connection
                .request(FrameBody::ToolsVersionRequest, Duration::from_secs(30))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.abort();

    let error = pending.await.unwrap().unwrap_err();
    assert_eq!(error.status_code(), StatusCode::ConnectionLost);

    // The handle reports closed once the driver notices.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let result = connection
        .request(FrameBody::ToolsVersionRequest, Duration::from_millis(100))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unsolicited_frames_reach_push_handler() {
    let (addr, server) = start_server(TestHandler {
        respond: false,
        delay: Duration::ZERO,
        push_on_connect: true,
    })
    .await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let push: crate::connection::PushHandler = Box::new(move |frame| {
        let _ = tx.send(frame);
    });
    let _connection = Connection::connect(&addr, TransportSettings::default(), Some(push))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match frame.body {
        FrameBody::CoordinatorInfo(info) => assert_eq!(info.message, "pushed"),
        other => panic!("unexpected push: {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn test_connect_refused() {
    // Port 1 is essentially never listening.
    let result = Connection::connect("127.0.0.1:1", TransportSettings::default(), None).await;
    let error = result.unwrap_err();
    assert_eq!(error.status_code(), StatusCode::ConnectionLost);
}
