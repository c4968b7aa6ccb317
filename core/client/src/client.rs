//! The remote-tool client runtime.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use distbuild_config::ClientConfig;
use distbuild_coordinator::CoordinatorClient;
use distbuild_error::ErrorExt;
use distbuild_invocation::ToolCommandline;
use distbuild_protocol::FrameBody;
use distbuild_protocol::RemoteToolRequest;
use distbuild_protocol::RemoteToolResponse;
use distbuild_protocol::ToolServerInfo;
use distbuild_protocol::compress;
use distbuild_protocol::decompress;
use distbuild_transport::Connection;
use distbuild_transport::TransportSettings;
use tokio::sync::Notify;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::selection::SelectionOutcome;
use crate::selection::select_worker;

/// Re-check cadence for a request waiting on worker capacity.
const PENDING_POLL: Duration = Duration::from_millis(100);

/// What one invocation produced. Mirrors the remote response after
/// decompression and post-processing; scheduler failures land here too,
/// with `success = false` and the reason in `std_out`.
#[derive(Debug, Clone, Default)]
pub struct InvokeOutcome {
    pub success: bool,
    pub std_out: String,
    pub file_data: Vec<u8>,
    pub execution_time: Duration,
    /// Worker that produced the final answer, when one was reached.
    pub worker: Option<(String, u16)>,
}

impl InvokeOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            std_out: message.into(),
            ..Default::default()
        }
    }
}

struct Shared {
    workers: Mutex<Vec<ToolServerInfo>>,
    snapshot_seen: Mutex<bool>,
    snapshot_changed: Notify,
    connections: tokio::sync::Mutex<HashMap<(String, u16), Connection>>,
}

/// Schedules invocations onto the worker grid.
pub struct RemoteToolClient {
    config: ClientConfig,
    transport: TransportSettings,
    expected_versions: BTreeMap<String, String>,
    client_id: String,
    session_id: u64,
    shared: Arc<Shared>,
    coordinator: CoordinatorClient,
}

impl RemoteToolClient {
    /// `expected_versions` is the local tool → version map the selection
    /// policy matches workers against.
    pub fn new(
        config: ClientConfig,
        transport: TransportSettings,
        expected_versions: BTreeMap<String, String>,
    ) -> Self {
        let client_id = if config.client_id.is_empty() {
            gethostname::gethostname().to_string_lossy().into_owned()
        } else {
            config.client_id.clone()
        };
        let session_id = uuid::Uuid::new_v4().as_u64_pair().0;
        let shared = Arc::new(Shared {
            workers: Mutex::new(Vec::new()),
            snapshot_seen: Mutex::new(false),
            snapshot_changed: Notify::new(),
            connections: tokio::sync::Mutex::new(HashMap::new()),
        });

        let coordinator = CoordinatorClient::new(config.coordinator.clone(), transport.clone());
        {
            let shared = Arc::clone(&shared);
            coordinator.set_info_arrived(Box::new(move |snapshot| {
                *shared.workers.lock().unwrap() = snapshot.tool_servers;
                *shared.snapshot_seen.lock().unwrap() = true;
                shared.snapshot_changed.notify_waiters();
            }));
        }

        Self {
            config,
            transport,
            expected_versions,
            client_id,
            session_id,
            shared,
            coordinator,
        }
    }

    /// Begin following the coordinators.
    pub fn start(&self) {
        self.coordinator.start();
    }

    pub fn stop(&self) {
        self.coordinator.stop();
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Inject a worker list directly, bypassing the coordinators. Used by
    /// fixed tool-server configurations.
    pub fn set_workers(&self, workers: Vec<ToolServerInfo>) {
        *self.shared.workers.lock().unwrap() = workers;
        *self.shared.snapshot_seen.lock().unwrap() = true;
        self.shared.snapshot_changed.notify_waiters();
    }

    pub fn workers(&self) -> Vec<ToolServerInfo> {
        self.shared.workers.lock().unwrap().clone()
    }

    /// Run one remote invocation to completion.
    ///
    /// The queue clock starts here: a request that cannot be dispatched
    /// before `queue_timeout` elapses fails with a queue-timeout outcome.
    /// Dispatched requests that die on transport are retried on another
    /// worker while attempts remain; the worker that failed is excluded
    /// for this invocation.
    pub async fn invoke_tool(&self, invocation: &ToolCommandline, input: &[u8]) -> InvokeOutcome {
        let tool_id = invocation.tool.tool_id.clone();
        let queue_deadline = Instant::now() + self.config.queue_timeout;
        let mut attempts_left = self.config.invocation_attempts;
        let mut excluded: HashSet<(String, u16)> = HashSet::new();
        let mut last_error = String::new();

        let payload = match compress(input, self.config.compression) {
            Ok(payload) => payload,
            Err(error) => return InvokeOutcome::failure(format!("compression failed: {error}")),
        };

        loop {
            let target = match self.await_worker(&tool_id, &excluded, queue_deadline).await {
                Ok(target) => target,
                Err(outcome) => {
                    return if last_error.is_empty() {
                        outcome
                    } else {
                        // A retry that ran out of workers reports the
                        // transport failure, not a scheduling one.
                        InvokeOutcome::failure(last_error)
                    };
                }
            };

            let key = target.key();
            debug!(
                tool = %tool_id,
                worker = %format!("{}:{}", key.0, key.1),
                attempts_left,
                "dispatching invocation"
            );

            match self.dispatch(&target, invocation, &payload).await {
                Ok(response) => return self.deliver(response, key),
                Err((error, retryable)) => {
                    warn!(
                        tool = %tool_id,
                        worker = %format!("{}:{}", key.0, key.1),
                        %error,
                        retryable,
                        "attempt failed"
                    );
                    if !retryable {
                        return InvokeOutcome::failure(error);
                    }
                    excluded.insert(key);
                    attempts_left = attempts_left.saturating_sub(1);
                    last_error = error;
                    if attempts_left == 0 {
                        return InvokeOutcome::failure(last_error);
                    }
                }
            }
        }
    }

    /// Wait until the selection policy yields a worker, the queue deadline
    /// passes, or eligibility is ruled out.
    async fn await_worker(
        &self,
        tool_id: &str,
        excluded: &HashSet<(String, u16)>,
        queue_deadline: Instant,
    ) -> Result<ToolServerInfo, InvokeOutcome> {
        loop {
            let snapshot_seen = *self.shared.snapshot_seen.lock().unwrap();
            let outcome = {
                let workers = self.shared.workers.lock().unwrap();
                select_worker(
                    &workers,
                    tool_id,
                    &self.expected_versions,
                    excluded,
                    self.config.minimal_remote_tasks,
                )
            };
            match outcome {
                SelectionOutcome::Dispatch(worker) | SelectionOutcome::Enqueue(worker) => {
                    return Ok(worker);
                }
                SelectionOutcome::NoEligible if snapshot_seen => {
                    return Err(InvokeOutcome::failure(format!(
                        "no eligible tool server for {tool_id}"
                    )));
                }
                SelectionOutcome::NoEligible | SelectionOutcome::Saturated => {
                    if Instant::now() >= queue_deadline {
                        return Err(InvokeOutcome::failure(format!(
                            "queue timeout waiting for a tool server for {tool_id}"
                        )));
                    }
                    tokio::select! {
                        _ = self.shared.snapshot_changed.notified() => {}
                        _ = tokio::time::sleep(PENDING_POLL) => {}
                    }
                }
            }
        }
    }

    /// One attempt against one worker. `Err((message, retryable))` is a
    /// transport-level failure; a reply with `success = false` is not an
    /// error here, the caller delivers it as-is.
    async fn dispatch(
        &self,
        worker: &ToolServerInfo,
        invocation: &ToolCommandline,
        payload: &[u8],
    ) -> Result<RemoteToolResponse, (String, bool)> {
        let connection = self.connection_for(worker).await?;
        let request = RemoteToolRequest {
            client_id: self.client_id.clone(),
            session_id: self.session_id,
            file_data: payload.to_vec(),
            args: invocation.args.clone(),
            tool_id: invocation.tool.tool_id.clone(),
            compression: self.config.compression,
        };
        let frame = connection
            .request(
                FrameBody::RemoteToolRequest(request),
                self.config.request_timeout,
            )
            .await
            .map_err(|error| (error.to_string(), error.status_code().is_retryable()))?;
        match frame.body {
            FrameBody::RemoteToolResponse(response) => Ok(response),
            other => Err((format!("unexpected response frame {:?}", other.kind()), false)),
        }
    }

    /// Decompress, post-process and hand the response out.
    fn deliver(&self, response: RemoteToolResponse, worker: (String, u16)) -> InvokeOutcome {
        if !response.success {
            return InvokeOutcome {
                success: false,
                std_out: response.std_out,
                file_data: Vec::new(),
                execution_time: response.execution_time,
                worker: Some(worker),
            };
        }
        let file_data = match decompress(&response.file_data, response.compression) {
            Ok(data) => data,
            Err(error) => {
                return InvokeOutcome::failure(format!("failed to decompress result: {error}"));
            }
        };
        let file_data = self.post_process(file_data);
        info!(
            worker = %format!("{}:{}", worker.0, worker.1),
            bytes = file_data.len(),
            micros = response.execution_time.as_micros() as u64,
            "remote invocation finished"
        );
        InvokeOutcome {
            success: true,
            std_out: response.std_out,
            file_data,
            execution_time: response.execution_time,
            worker: Some(worker),
        }
    }

    /// Byte-wise needle replacement over the returned object, e.g. to
    /// rewrite embedded absolute paths.
    fn post_process(&self, mut data: Vec<u8>) -> Vec<u8> {
        for pattern in &self.config.post_process {
            if pattern.needle.is_empty() {
                continue;
            }
            data = replace_bytes(
                &data,
                pattern.needle.as_bytes(),
                pattern.replacement.as_bytes(),
            );
        }
        data
    }

    /// Lazily opened, cached per worker; dropped when the socket dies.
    async fn connection_for(
        &self,
        worker: &ToolServerInfo,
    ) -> Result<Connection, (String, bool)> {
        let key = worker.key();
        let mut connections = self.shared.connections.lock().await;
        if let Some(existing) = connections.get(&key) {
            if existing.is_open() {
                return Ok(existing.clone());
            }
            connections.remove(&key);
        }
        let addr = format!("{}:{}", worker.host, worker.port);
        match Connection::connect(&addr, self.transport.clone(), None).await {
            Ok(connection) => {
                connections.insert(key, connection.clone());
                Ok(connection)
            }
            Err(error) => Err((error.to_string(), error.status_code().is_retryable())),
        }
    }
}

/// Replace every occurrence of `needle` in `data`.
fn replace_bytes(data: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut index = 0;
    while index < data.len() {
        if data[index..].starts_with(needle) {
            out.extend_from_slice(replacement);
            index += needle.len();
        } else {
            out.push(data[index]);
            index += 1;
        }
    }
    out
}

#[cfg(test)]
#[path = "client.test.rs"]
mod tests;
