use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use distbuild_protocol::ToolsVersionResponse;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use super::*;
use crate::Connection;

/// Replies to version requests; the delay comes from the request count so
/// the first request finishes last.
struct ReorderingHandler {
    counter: std::sync::atomic::AtomicU64,
}

impl FrameHandler for ReorderingHandler {
    fn on_frame(self: Arc<Self>, ctx: ConnectionCtx, frame: Frame) {
        let order = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::spawn(async move {
            // First request waits longest: responses leave in reverse.
            let delay = Duration::from_millis(120u64.saturating_sub(order * 60));
            tokio::time::sleep(delay).await;
            let mut versions = BTreeMap::new();
            versions.insert("order".to_string(), order.to_string());
            ctx.send(Frame::new(
                frame.transaction_id,
                FrameBody::ToolsVersionResponse(ToolsVersionResponse { versions }),
            ));
        });
    }
}

struct RejectingHandler;

impl FrameHandler for RejectingHandler {
    fn on_frame(self: Arc<Self>, _ctx: ConnectionCtx, _frame: Frame) {}

    fn allow(&self, _peer: &std::net::SocketAddr) -> bool {
        false
    }
}

#[tokio::test]
async fn test_responses_may_arrive_out_of_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::new(ReorderingHandler {
            counter: std::sync::atomic::AtomicU64::new(0),
        }),
    ));

    let connection = Connection::connect(&addr, TransportSettings::default(), None)
        .await
        .unwrap();

    let slow = {
        let connection = connection.clone();
        tokio::spawn(async move {
            connection
                .request(FrameBody::ToolsVersionRequest, Duration::from_secs(5))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let fast = connection
        .request(FrameBody::ToolsVersionRequest, Duration::from_secs(5))
        .await
        .unwrap();
    let slow = slow.await.unwrap().unwrap();

    // Each response carries the order its request was received in, so a
    // swap would be visible here.
    let order_of = |frame: &Frame| match &frame.body {
        FrameBody::ToolsVersionResponse(response) => {
            response.versions.get("order").cloned().unwrap_or_default()
        }
        _ => panic!("unexpected body"),
    };
    assert_eq!(order_of(&slow), "0");
    assert_eq!(order_of(&fast), "1");
    server.abort();
}

#[tokio::test]
async fn test_disallowed_peer_is_dropped_before_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::new(RejectingHandler),
    ));

    // The TCP connect itself may succeed; any request on it must fail.
    if let Ok(connection) = Connection::connect(&addr, TransportSettings::default(), None).await {
        let result = connection
            .request(FrameBody::ToolsVersionRequest, Duration::from_millis(300))
            .await;
        assert!(result.is_err());
    }
    server.abort();
}

#[tokio::test]
async fn test_version_mismatch_closes_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(serve(
        listener,
        TransportSettings::default(),
        Arc::new(ReorderingHandler {
            counter: std::sync::atomic::AtomicU64::new(0),
        }),
    ));

    let mismatched = TransportSettings {
        protocol_version: 9999,
        ..Default::default()
    };
    let connection = Connection::connect(&addr, mismatched, None).await.unwrap();
    let result = connection
        .request(FrameBody::ToolsVersionRequest, Duration::from_secs(1))
        .await;
    assert!(result.is_err());
    server.abort();
}
