//! Client side: subscribe to coordinators, merge snapshots, publish status.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use distbuild_config::CoordinatorSettings;
use distbuild_config::Redundance;
use distbuild_protocol::CoordinatorInfo;
use distbuild_protocol::Frame;
use distbuild_protocol::FrameBody;
use distbuild_protocol::ToolServerInfo;
use distbuild_transport::Connection;
use distbuild_transport::PushHandler;
use distbuild_transport::TransportSettings;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

/// Invoked with every merged snapshot. Runs on a connection driver task;
/// must not block.
pub type InfoCallback = Box<dyn Fn(CoordinatorInfo) + Send + Sync + 'static>;

/// Supplies the publisher's own status at each reporting interval.
pub type StatusSource = Box<dyn Fn() -> ToolServerInfo + Send + Sync + 'static>;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Merged {
    /// Per-coordinator snapshots with an arrival sequence; the merge lets
    /// the most recently arrived record win per worker key.
    per_coordinator: HashMap<String, (u64, CoordinatorInfo)>,
    next_seq: u64,
}

impl Merged {
    fn absorb(&mut self, coordinator: &str, info: CoordinatorInfo) -> CoordinatorInfo {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.per_coordinator
            .insert(coordinator.to_string(), (seq, info));

        let mut sources: Vec<&(u64, CoordinatorInfo)> = self.per_coordinator.values().collect();
        sources.sort_by_key(|(seq, _)| *seq);
        let mut merged: HashMap<(String, u16), ToolServerInfo> = HashMap::new();
        let mut message = String::new();
        for (_, info) in sources {
            for server in &info.tool_servers {
                merged.insert(server.key(), server.clone());
            }
            if !info.message.is_empty() {
                message = info.message.clone();
            }
        }
        let mut tool_servers: Vec<ToolServerInfo> = merged.into_values().collect();
        tool_servers.sort_by(|a, b| a.key().cmp(&b.key()));
        CoordinatorInfo {
            tool_servers,
            message,
        }
    }
}

struct Inner {
    merged: Mutex<Merged>,
    info_arrived: Mutex<Option<InfoCallback>>,
    status_source: Mutex<Option<StatusSource>>,
    connections: Mutex<Vec<Connection>>,
}

/// Connects to the configured coordinators per the redundance mode and
/// keeps the connections alive. See the crate docs for the merge rules.
pub struct CoordinatorClient {
    settings: CoordinatorSettings,
    transport: TransportSettings,
    inner: Arc<Inner>,
    cancel: CancellationToken,
}

impl CoordinatorClient {
    pub fn new(settings: CoordinatorSettings, transport: TransportSettings) -> Self {
        Self {
            settings,
            transport,
            inner: Arc::new(Inner {
                merged: Mutex::new(Merged::default()),
                info_arrived: Mutex::new(None),
                status_source: Mutex::new(None),
                connections: Mutex::new(Vec::new()),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Register the snapshot callback. Set before `start`.
    pub fn set_info_arrived(&self, callback: InfoCallback) {
        *self.inner.info_arrived.lock().unwrap() = Some(callback);
    }

    /// Make this client a publisher: `source` is polled on every
    /// `send_info_interval` tick and the result pushed to each
    /// coordinator.
    pub fn set_status_source(&self, source: StatusSource) {
        *self.inner.status_source.lock().unwrap() = Some(source);
    }

    /// Spawn the connection-maintenance (and, for publishers, reporting)
    /// tasks. Returns immediately; connections come and go in the
    /// background.
    pub fn start(&self) {
        if !self.settings.enabled || self.settings.hosts.is_empty() {
            debug!("coordinator client disabled");
            return;
        }
        // A host entry may carry its own port, overriding the shared one.
        let addrs: Vec<String> = self
            .settings
            .hosts
            .iter()
            .map(|host| {
                if host.contains(':') {
                    host.clone()
                } else {
                    format!("{host}:{}", self.settings.port)
                }
            })
            .collect();

        match self.settings.redundance {
            Redundance::All => {
                for addr in addrs {
                    tokio::spawn(maintain(
                        addr,
                        self.transport.clone(),
                        Arc::clone(&self.inner),
                        self.cancel.clone(),
                    ));
                }
            }
            Redundance::Any => {
                tokio::spawn(maintain_any(
                    addrs,
                    self.transport.clone(),
                    Arc::clone(&self.inner),
                    self.cancel.clone(),
                ));
            }
        }

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        let interval = self.settings.send_info_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => publish_status(&inner),
                }
            }
        });
    }

    /// Ask any live coordinator for an immediate snapshot.
    pub async fn request_snapshot(&self, timeout: Duration) -> Option<CoordinatorInfo> {
        let connection = self.inner.connections.lock().unwrap().first().cloned()?;
        let frame = connection
            .request(FrameBody::SnapshotRequest, timeout)
            .await
            .ok()?;
        match frame.body {
            FrameBody::CoordinatorInfo(info) => Some(info),
            _ => None,
        }
    }

    /// Like [`Self::request_snapshot`], but keeps trying while connections
    /// are still being established, up to `timeout` overall.
    pub async fn request_snapshot_with_retry(&self, timeout: Duration) -> Option<CoordinatorInfo> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(info) = self.request_snapshot(Duration::from_secs(5)).await {
                return Some(info);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }


    /// Stop maintaining connections.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }
}

impl Drop for CoordinatorClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn publish_status(inner: &Arc<Inner>) {
    let status = {
        let source = inner.status_source.lock().unwrap();
        let Some(source) = source.as_ref() else {
            return;
        };
        source()
    };
    let connections = inner.connections.lock().unwrap().clone();
    for connection in connections {
        if let Err(error) = connection.notify(FrameBody::WorkerStatus(status.clone())) {
            debug!(addr = connection.addr(), %error, "status publish failed");
        }
    }
}

fn make_push(inner: Arc<Inner>, addr: String) -> PushHandler {
    Box::new(move |frame: Frame| {
        if let FrameBody::CoordinatorInfo(info) = frame.body {
            let merged = inner.merged.lock().unwrap().absorb(&addr, info);
            let callback = inner.info_arrived.lock().unwrap();
            if let Some(callback) = callback.as_ref() {
                callback(merged);
            }
        }
    })
}

async fn connect_once(
    addr: &str,
    transport: &TransportSettings,
    inner: &Arc<Inner>,
) -> Option<Connection> {
    let push = make_push(Arc::clone(inner), addr.to_string());
    match Connection::connect(addr, transport.clone(), Some(push)).await {
        Ok(connection) => {
            debug!(addr, "coordinator connected");
            inner
                .connections
                .lock()
                .unwrap()
                .push(connection.clone());
            // A publisher should appear in the registry immediately, not
            // one interval later.
            publish_status(inner);
            Some(connection)
        }
        Err(error) => {
            warn!(addr, %error, "coordinator connect failed");
            None
        }
    }
}

fn forget_connection(inner: &Arc<Inner>) {
    inner.connections.lock().unwrap().retain(Connection::is_open);
}

async fn wait_closed(connection: &Connection, cancel: &CancellationToken) {
    loop {
        if !connection.is_open() || cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// All-mode: one task per coordinator, reconnecting forever.
async fn maintain(
    addr: String,
    transport: TransportSettings,
    inner: Arc<Inner>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        if let Some(connection) = connect_once(&addr, &transport, &inner).await {
            wait_closed(&connection, &cancel).await;
            forget_connection(&inner);
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Any-mode: walk the host list until one accepts; reconnect walks again.
async fn maintain_any(
    addrs: Vec<String>,
    transport: TransportSettings,
    inner: Arc<Inner>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let mut connected = false;
        for addr in &addrs {
            if let Some(connection) = connect_once(addr, &transport, &inner).await {
                connected = true;
                wait_closed(&connection, &cancel).await;
                forget_connection(&inner);
                break;
            }
        }
        if !connected {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "client.test.rs"]
mod tests;
