//! Frame handling for one tool server.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use distbuild_config::WorkerConfig;
use distbuild_executor::LocalExecutor;
use distbuild_executor::LocalTask;
use distbuild_invocation::InvocationRewriter;
use distbuild_protocol::CompressionInfo;
use distbuild_protocol::ConnectedClientInfo;
use distbuild_protocol::Frame;
use distbuild_protocol::FrameBody;
use distbuild_protocol::RemoteToolRequest;
use distbuild_protocol::RemoteToolResponse;
use distbuild_protocol::ToolServerInfo;
use distbuild_protocol::ToolsVersionResponse;
use distbuild_protocol::compress;
use distbuild_protocol::decompress;
use distbuild_transport::ConnectionCtx;
use distbuild_transport::FrameHandler;
use tracing::debug;
use tracing::info;
use tracing::warn;

struct ClientRecord {
    info: ConnectedClientInfo,
    in_flight: u16,
}

/// The worker's frame handler plus the status it advertises.
pub struct WorkerService {
    config: WorkerConfig,
    executor: LocalExecutor,
    rewriter: InvocationRewriter,
    versions: BTreeMap<String, String>,
    clients: Mutex<HashMap<u64, ClientRecord>>,
}

impl WorkerService {
    pub fn new(
        config: WorkerConfig,
        executor: LocalExecutor,
        rewriter: InvocationRewriter,
        versions: BTreeMap<String, String>,
    ) -> Self {
        Self {
            config,
            executor,
            rewriter,
            versions,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The record published to coordinators.
    pub fn status(&self) -> ToolServerInfo {
        let host = if self.config.server_name.is_empty() {
            gethostname::gethostname().to_string_lossy().into_owned()
        } else {
            self.config.server_name.clone()
        };
        let clients = self.clients.lock().unwrap();
        ToolServerInfo {
            host,
            port: self.config.listen_port,
            total_threads: self.config.thread_count,
            running_tasks: self.executor.running_tasks() as u16,
            queued_tasks: self.executor.queued_tasks() as u16,
            tool_ids: self.rewriter.tool_ids(),
            tool_versions: self.versions.clone(),
            connected_clients: clients.values().map(|record| record.info.clone()).collect(),
        }
    }

    pub fn versions(&self) -> &BTreeMap<String, String> {
        &self.versions
    }

    /// Response codec policy: echo the client's codec, or use our own.
    fn response_compression(&self, request_compression: CompressionInfo) -> CompressionInfo {
        if self.config.use_client_compression {
            request_compression
        } else {
            self.config.compression
        }
    }

    fn note_request(&self, ctx: &ConnectionCtx, request: &RemoteToolRequest) {
        let mut clients = self.clients.lock().unwrap();
        let record = clients
            .entry(ctx.connection_id)
            .or_insert_with(|| ClientRecord {
                info: ConnectedClientInfo {
                    client_id: request.client_id.clone(),
                    client_host: ctx.peer.ip().to_string(),
                    session_id: request.session_id,
                    used_threads: 0,
                },
                in_flight: 0,
            });
        record.info.client_id = request.client_id.clone();
        record.info.session_id = request.session_id;
        record.in_flight += 1;
        record.info.used_threads = record.in_flight;
    }

    fn note_done(&self, connection_id: u64) {
        let mut clients = self.clients.lock().unwrap();
        if let Some(record) = clients.get_mut(&connection_id) {
            record.in_flight = record.in_flight.saturating_sub(1);
            record.info.used_threads = record.in_flight;
        }
    }

    fn handle_tool_request(self: Arc<Self>, ctx: ConnectionCtx, id: u64, request: RemoteToolRequest) {
        let respond_error = |message: String, ctx: &ConnectionCtx| {
            warn!(tool = %request.tool_id, %message, "rejecting tool request");
            ctx.send(Frame::new(
                id,
                FrameBody::RemoteToolResponse(RemoteToolResponse {
                    success: false,
                    file_data: Vec::new(),
                    std_out: message,
                    execution_time: std::time::Duration::ZERO,
                    compression: CompressionInfo::NONE,
                }),
            ));
        };

        let input_data = match decompress(&request.file_data, request.compression) {
            Ok(data) => data,
            Err(error) => {
                respond_error(format!("failed to decompress input: {error}"), &ctx);
                return;
            }
        };
        let invocation = match self.rewriter.parse(&request.tool_id, request.args.clone()) {
            Ok(invocation) => invocation,
            Err(error) => {
                respond_error(error.to_string(), &ctx);
                return;
            }
        };
        let env_command = self
            .rewriter
            .tool_by_id(&request.tool_id)
            .and_then(|tool| tool.env_command.clone());

        debug!(
            tool = %request.tool_id,
            client = %request.client_id,
            session = request.session_id,
            bytes = input_data.len(),
            "accepted compile job"
        );
        self.note_request(&ctx, &request);

        let mut task = LocalTask::new(invocation);
        task.write_input = true;
        task.read_output = true;
        task.input_data = input_data;
        task.env_command = env_command;

        let response_compression = self.response_compression(request.compression);
        let service = Arc::clone(&self);
        let connection_id = ctx.connection_id;
        self.executor.add_task(
            task,
            Box::new(move |result| {
                service.note_done(connection_id);
                let response = match (result.success, compress(&result.output_data, response_compression)) {
                    (true, Ok(file_data)) => RemoteToolResponse {
                        success: true,
                        file_data,
                        std_out: result.std_out,
                        execution_time: result.execution_time,
                        compression: response_compression,
                    },
                    (true, Err(error)) => RemoteToolResponse {
                        success: false,
                        file_data: Vec::new(),
                        std_out: format!("failed to compress output: {error}"),
                        execution_time: result.execution_time,
                        compression: CompressionInfo::NONE,
                    },
                    (false, _) => RemoteToolResponse {
                        success: false,
                        file_data: Vec::new(),
                        std_out: result.std_out,
                        execution_time: result.execution_time,
                        compression: CompressionInfo::NONE,
                    },
                };
                ctx.send(Frame::new(id, FrameBody::RemoteToolResponse(response)));
            }),
        );
    }
}

impl FrameHandler for WorkerService {
    fn on_frame(self: Arc<Self>, ctx: ConnectionCtx, frame: Frame) {
        match frame.body {
            FrameBody::RemoteToolRequest(request) => {
                self.handle_tool_request(ctx, frame.transaction_id, request);
            }
            FrameBody::ToolsVersionRequest => {
                ctx.send(Frame::new(
                    frame.transaction_id,
                    FrameBody::ToolsVersionResponse(ToolsVersionResponse {
                        versions: self.versions.clone(),
                    }),
                ));
            }
            other => {
                debug!(peer = %ctx.peer, kind = ?other.kind(), "ignoring frame");
            }
        }
    }

    fn allow(&self, peer: &SocketAddr) -> bool {
        if self.config.host_allowlist.is_empty() {
            return true;
        }
        let ip = peer.ip().to_string();
        let allowed = self.config.host_allowlist.iter().any(|host| *host == ip);
        if !allowed {
            info!(%peer, "connection refused by allowlist");
        }
        allowed
    }

    fn on_disconnected(&self, ctx: &ConnectionCtx) {
        self.clients.lock().unwrap().remove(&ctx.connection_id);
    }
}

#[cfg(test)]
#[path = "service.test.rs"]
mod tests;
