//! Typed frames and their payload encodings.
//!
//! Each request/response pair carries a `VERSION` constant; the channel
//! protocol version exchanged in the handshake is the sum over the pairs in
//! use, so bumping any frame's layout forces both ends to agree.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::BufMut;
use bytes::BytesMut;

use crate::codec::RawFrame;
use crate::compress::CompressionInfo;
use crate::compress::get_envelope;
use crate::compress::put_envelope;
use crate::error::Result;
use crate::error::protocol_error;
use crate::info::CoordinatorInfo;
use crate::info::ToolServerInfo;
use crate::wire;

/// Frame kind ids. 0 and 1 are channel-internal; user frames start at 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    ConnectionStatus = 0,
    Segment = 1,
    RemoteToolRequest = 9,
    RemoteToolResponse = 10,
    ToolsVersionRequest = 11,
    ToolsVersionResponse = 12,
    WorkerStatus = 13,
    CoordinatorInfo = 14,
    SnapshotRequest = 15,
}

impl FrameKind {
    pub fn from_u8(id: u8) -> Result<Self> {
        Ok(match id {
            0 => Self::ConnectionStatus,
            1 => Self::Segment,
            9 => Self::RemoteToolRequest,
            10 => Self::RemoteToolResponse,
            11 => Self::ToolsVersionRequest,
            12 => Self::ToolsVersionResponse,
            13 => Self::WorkerStatus,
            14 => Self::CoordinatorInfo,
            15 => Self::SnapshotRequest,
            other => {
                return Err(protocol_error::MalformedSnafu {
                    what: format!("unknown frame kind {other}"),
                }
                .build());
            }
        })
    }
}

/// One compile job shipped to a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteToolRequest {
    pub client_id: String,
    pub session_id: u64,
    /// Input bytes, compressed per `compression`.
    pub file_data: Vec<u8>,
    pub args: Vec<String>,
    pub tool_id: String,
    pub compression: CompressionInfo,
}

impl RemoteToolRequest {
    pub const VERSION: u32 = 2;
}

/// The tool server's answer to one [`RemoteToolRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteToolResponse {
    pub success: bool,
    /// Output bytes, compressed per `compression`. Empty on failure.
    pub file_data: Vec<u8>,
    pub std_out: String,
    pub execution_time: Duration,
    pub compression: CompressionInfo,
}

impl RemoteToolResponse {
    pub const VERSION: u32 = 2;
}

/// `tool id -> version string` for every tool a server offers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolsVersionResponse {
    pub versions: BTreeMap<String, String>,
}

impl ToolsVersionResponse {
    pub const VERSION: u32 = 1;
}

/// Version constant for the frame kinds with empty payloads.
const TOOLS_VERSION_REQUEST_VERSION: u32 = 1;
const COORDINATOR_FAMILY_VERSION: u32 = 3;

/// The version both ends of a channel must agree on: the sum of the
/// versions of every frame pair in the protocol.
pub const CHANNEL_PROTOCOL_VERSION: u32 = RemoteToolRequest::VERSION
    + RemoteToolResponse::VERSION
    + TOOLS_VERSION_REQUEST_VERSION
    + ToolsVersionResponse::VERSION
    + COORDINATOR_FAMILY_VERSION;

/// Payload of a decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// Handshake and idle heartbeat. Carries the sender's protocol version.
    ConnectionStatus { protocol_version: u32 },
    RemoteToolRequest(RemoteToolRequest),
    RemoteToolResponse(RemoteToolResponse),
    ToolsVersionRequest,
    ToolsVersionResponse(ToolsVersionResponse),
    /// A tool server publishing its current load to a coordinator.
    WorkerStatus(ToolServerInfo),
    /// A coordinator fanning its registry out to a subscriber.
    CoordinatorInfo(CoordinatorInfo),
    /// A subscriber asking for one immediate snapshot.
    SnapshotRequest,
}

impl FrameBody {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::ConnectionStatus { .. } => FrameKind::ConnectionStatus,
            Self::RemoteToolRequest(_) => FrameKind::RemoteToolRequest,
            Self::RemoteToolResponse(_) => FrameKind::RemoteToolResponse,
            Self::ToolsVersionRequest => FrameKind::ToolsVersionRequest,
            Self::ToolsVersionResponse(_) => FrameKind::ToolsVersionResponse,
            Self::WorkerStatus(_) => FrameKind::WorkerStatus,
            Self::CoordinatorInfo(_) => FrameKind::CoordinatorInfo,
            Self::SnapshotRequest => FrameKind::SnapshotRequest,
        }
    }
}

/// A frame as handled above the codec: correlation id plus typed body.
///
/// `transaction_id` 0 means no reply is expected; a response copies the id
/// of the request it answers. The id is the first payload field of every
/// user frame. `ConnectionStatus` frames carry no id.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub transaction_id: u64,
    pub body: FrameBody,
}

impl Frame {
    pub fn new(transaction_id: u64, body: FrameBody) -> Self {
        Self {
            transaction_id,
            body,
        }
    }

    /// A frame that does not take part in request/response correlation.
    pub fn notification(body: FrameBody) -> Self {
        Self::new(0, body)
    }

    pub fn kind(&self) -> FrameKind {
        self.body.kind()
    }

    /// Encode into a raw frame ready for the codec.
    pub fn encode(&self) -> RawFrame {
        let mut buf = BytesMut::new();
        match &self.body {
            FrameBody::ConnectionStatus { protocol_version } => {
                buf.put_u32_le(*protocol_version);
            }
            FrameBody::RemoteToolRequest(request) => {
                buf.put_u64_le(self.transaction_id);
                wire::put_string(&mut buf, &request.client_id);
                buf.put_u64_le(request.session_id);
                put_envelope(&mut buf, &request.file_data, request.compression);
                wire::put_string_list(&mut buf, &request.args);
                wire::put_string(&mut buf, &request.tool_id);
            }
            FrameBody::RemoteToolResponse(response) => {
                buf.put_u64_le(self.transaction_id);
                buf.put_u8(u8::from(response.success));
                put_envelope(&mut buf, &response.file_data, response.compression);
                wire::put_string(&mut buf, &response.std_out);
                buf.put_u64_le(response.execution_time.as_micros() as u64);
            }
            FrameBody::ToolsVersionRequest | FrameBody::SnapshotRequest => {
                buf.put_u64_le(self.transaction_id);
            }
            FrameBody::ToolsVersionResponse(response) => {
                buf.put_u64_le(self.transaction_id);
                wire::put_string_map(&mut buf, &response.versions);
            }
            FrameBody::WorkerStatus(info) => {
                buf.put_u64_le(self.transaction_id);
                info.encode(&mut buf);
            }
            FrameBody::CoordinatorInfo(info) => {
                buf.put_u64_le(self.transaction_id);
                info.encode(&mut buf);
            }
        }
        RawFrame {
            kind: self.kind() as u8,
            payload: buf.freeze(),
        }
    }

    /// Decode a raw frame delivered by the codec.
    pub fn decode(raw: RawFrame) -> Result<Self> {
        let kind = FrameKind::from_u8(raw.kind)?;
        let mut buf = raw.payload;
        let frame = match kind {
            FrameKind::ConnectionStatus => Frame::notification(FrameBody::ConnectionStatus {
                protocol_version: wire::get_u32(&mut buf, "protocol_version")?,
            }),
            FrameKind::Segment => {
                return Err(protocol_error::MalformedSnafu {
                    what: "segment frame leaked past reassembly".to_string(),
                }
                .build());
            }
            FrameKind::RemoteToolRequest => {
                let transaction_id = wire::get_u64(&mut buf, "transaction_id")?;
                let client_id = wire::get_string(&mut buf, "client_id")?;
                let session_id = wire::get_u64(&mut buf, "session_id")?;
                let (compression, file_data) = get_envelope(&mut buf, "file_data")?;
                let args = wire::get_string_list(&mut buf, "args")?;
                let tool_id = wire::get_string(&mut buf, "tool_id")?;
                Frame::new(
                    transaction_id,
                    FrameBody::RemoteToolRequest(RemoteToolRequest {
                        client_id,
                        session_id,
                        file_data,
                        args,
                        tool_id,
                        compression,
                    }),
                )
            }
            FrameKind::RemoteToolResponse => {
                let transaction_id = wire::get_u64(&mut buf, "transaction_id")?;
                let success = wire::get_u8(&mut buf, "success")? != 0;
                let (compression, file_data) = get_envelope(&mut buf, "file_data")?;
                let std_out = wire::get_string(&mut buf, "std_out")?;
                let micros = wire::get_u64(&mut buf, "execution_time")?;
                Frame::new(
                    transaction_id,
                    FrameBody::RemoteToolResponse(RemoteToolResponse {
                        success,
                        file_data,
                        std_out,
                        execution_time: Duration::from_micros(micros),
                        compression,
                    }),
                )
            }
            FrameKind::ToolsVersionRequest => Frame::new(
                wire::get_u64(&mut buf, "transaction_id")?,
                FrameBody::ToolsVersionRequest,
            ),
            FrameKind::ToolsVersionResponse => {
                let transaction_id = wire::get_u64(&mut buf, "transaction_id")?;
                let versions = wire::get_string_map(&mut buf, "versions")?;
                Frame::new(
                    transaction_id,
                    FrameBody::ToolsVersionResponse(ToolsVersionResponse { versions }),
                )
            }
            FrameKind::WorkerStatus => {
                let transaction_id = wire::get_u64(&mut buf, "transaction_id")?;
                let info = ToolServerInfo::decode(&mut buf)?;
                Frame::new(transaction_id, FrameBody::WorkerStatus(info))
            }
            FrameKind::CoordinatorInfo => {
                let transaction_id = wire::get_u64(&mut buf, "transaction_id")?;
                let info = CoordinatorInfo::decode(&mut buf)?;
                Frame::new(transaction_id, FrameBody::CoordinatorInfo(info))
            }
            FrameKind::SnapshotRequest => Frame::new(
                wire::get_u64(&mut buf, "transaction_id")?,
                FrameBody::SnapshotRequest,
            ),
        };
        Ok(frame)
    }
}

#[cfg(test)]
#[path = "frames.test.rs"]
mod tests;
