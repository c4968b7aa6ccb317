//! Framed-TCP transport runtime.
//!
//! One [`Connection`] owns one socket through a driver task: requests get a
//! monotonically increasing transaction id and an entry in the correlation
//! map; a periodic scan expires overdue entries with `Timeout`; a socket
//! error completes everything pending with `ConnectionLost`. The transport
//! never retries — failover lives with the callers.
//!
//! [`serve`] is the other direction: an accept loop that hands each
//! connection's frames to a [`FrameHandler`] and writes whatever the
//! handler sends back, in whatever order it finishes.

pub mod connection;
pub mod error;
pub mod server;

use std::time::Duration;

use distbuild_protocol::CHANNEL_PROTOCOL_VERSION;
use distbuild_protocol::DEFAULT_SEGMENT_SIZE;

pub use connection::{Connection, PushHandler};
pub use error::{Result, TransportError};
pub use server::{ConnectionCtx, FrameHandler, serve};

/// How often the correlation map is scanned for expired requests.
pub const EXPIRY_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Channel-level knobs shared by both directions.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub segment_size: usize,
    /// Idle heartbeat period; also the silence budget for peer liveness.
    pub heartbeat_interval: Duration,
    pub protocol_version: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            heartbeat_interval: Duration::from_secs(5),
            protocol_version: CHANNEL_PROTOCOL_VERSION,
        }
    }
}
