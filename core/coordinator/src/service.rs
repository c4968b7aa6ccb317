//! The in-memory worker registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use distbuild_protocol::CoordinatorInfo;
use distbuild_protocol::Frame;
use distbuild_protocol::FrameBody;
use distbuild_protocol::ToolServerInfo;
use distbuild_transport::ConnectionCtx;
use distbuild_transport::FrameHandler;
use tracing::debug;
use tracing::info;

/// Mutations within this window collapse into one broadcast.
const COALESCE_WINDOW: Duration = Duration::from_millis(50);

#[derive(Default)]
struct State {
    /// Worker records keyed by advertised `(host, port)`.
    registry: Mutex<HashMap<(String, u16), ToolServerInfo>>,
    /// Every live connection; all of them receive snapshot broadcasts.
    peers: Mutex<HashMap<u64, ConnectionCtx>>,
    /// Which registry key each publishing connection owns, for eviction.
    publishers: Mutex<HashMap<u64, (String, u16)>>,
    broadcast_scheduled: AtomicBool,
}

/// The coordinator's frame handler. Plug into [`distbuild_transport::serve`].
#[derive(Default)]
pub struct CoordinatorService {
    state: Arc<State>,
}

impl CoordinatorService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current registry as a snapshot.
    pub fn snapshot(&self) -> CoordinatorInfo {
        snapshot_of(&self.state)
    }

    /// Coalesce mutations: the first caller in a window schedules the
    /// broadcast, later callers ride along.
    fn schedule_broadcast(&self) {
        if self.state.broadcast_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(COALESCE_WINDOW).await;
            state.broadcast_scheduled.store(false, Ordering::SeqCst);
            broadcast(&state);
        });
    }
}

fn snapshot_of(state: &State) -> CoordinatorInfo {
    let registry = state.registry.lock().unwrap();
    let mut tool_servers: Vec<ToolServerInfo> = registry.values().cloned().collect();
    tool_servers.sort_by(|a, b| a.key().cmp(&b.key()));
    CoordinatorInfo {
        tool_servers,
        message: String::new(),
    }
}

fn broadcast(state: &State) {
    let snapshot = snapshot_of(state);
    let peers = state.peers.lock().unwrap();
    debug!(
        workers = snapshot.tool_servers.len(),
        peers = peers.len(),
        "broadcasting registry"
    );
    for ctx in peers.values() {
        ctx.send(Frame::notification(FrameBody::CoordinatorInfo(
            snapshot.clone(),
        )));
    }
}

impl FrameHandler for CoordinatorService {
    fn on_frame(self: Arc<Self>, ctx: ConnectionCtx, frame: Frame) {
        match frame.body {
            FrameBody::WorkerStatus(status) => {
                let key = status.key();
                {
                    let mut registry =
                        self.state.registry.lock().unwrap();
                    if registry.insert(key.clone(), status).is_none() {
                        info!(worker = ?key, "worker joined");
                    }
                }
                self.state
                    .publishers
                    .lock()
                    .unwrap()
                    .insert(ctx.connection_id, key);
                self.schedule_broadcast();
            }
            FrameBody::SnapshotRequest => {
                ctx.send(Frame::new(
                    frame.transaction_id,
                    FrameBody::CoordinatorInfo(self.snapshot()),
                ));
            }
            other => {
                debug!(peer = %ctx.peer, body = ?other.kind(), "ignoring frame");
            }
        }
    }

    fn on_connected(&self, ctx: &ConnectionCtx) {
        self.state
            .peers
            .lock()
            .unwrap()
            .insert(ctx.connection_id, ctx.clone());
        // A fresh subscriber gets the current view without waiting for the
        // next mutation.
        ctx.send(Frame::notification(FrameBody::CoordinatorInfo(
            self.snapshot(),
        )));
    }

    fn on_disconnected(&self, ctx: &ConnectionCtx) {
        self.state
            .peers
            .lock()
            .unwrap()
            .remove(&ctx.connection_id);
        let key = self
            .state
            .publishers
            .lock()
            .unwrap()
            .remove(&ctx.connection_id);
        if let Some(key) = key {
            info!(worker = ?key, "worker left");
            self.state
                .registry
                .lock()
                .unwrap()
                .remove(&key);
            self.schedule_broadcast();
        }
    }

    fn allow(&self, _peer: &SocketAddr) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "service.test.rs"]
mod tests;
