//! Wire model for the distbuild channel protocol.
//!
//! A channel is a single full-duplex TCP connection carrying typed frames.
//! Each frame is `u8 kind, u32 length, payload`; every integer on the wire
//! is little-endian, strings are length-prefixed UTF-8. Payloads larger than
//! the negotiated segment size travel as [`frames::FrameKind::Segment`]
//! frames and are reassembled per connection.
//!
//! File payloads are wrapped in a compression envelope
//! (`type, level, length, bytes`) so the two sides never need to negotiate
//! codecs up front: the receiver decompresses whatever the envelope declares,
//! or fails with `UnsupportedCompression`.

pub mod codec;
pub mod compress;
pub mod error;
pub mod frames;
pub mod info;
pub mod wire;

pub use codec::{FrameCodec, RawFrame};
pub use compress::{CompressionInfo, CompressionType, compress, decompress};
pub use error::{ProtocolError, Result};
pub use frames::{
    CHANNEL_PROTOCOL_VERSION, Frame, FrameBody, FrameKind, RemoteToolRequest, RemoteToolResponse,
    ToolsVersionResponse,
};
pub use info::{ConnectedClientInfo, CoordinatorInfo, ToolServerInfo};

/// Default segment size for oversize frame payloads.
pub const DEFAULT_SEGMENT_SIZE: usize = 8192;
