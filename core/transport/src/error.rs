//! Transport error type.

use distbuild_error::ErrorExt;
use distbuild_error::Location;
use distbuild_error::StatusCode;
use distbuild_protocol::ProtocolError;
use snafu::Snafu;

/// Errors surfaced by connections and the serve loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum TransportError {
    #[snafu(display("failed to connect to {addr}: {source}"))]
    Connect {
        addr: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// The connection dropped with this request pending.
    #[snafu(display("connection to {addr} lost"))]
    ConnectionLost {
        addr: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The correlation entry expired before a response arrived.
    #[snafu(display("request to {addr} timed out"))]
    Timeout {
        addr: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// Frame-level failure (decode error, version mismatch, codec error).
    #[snafu(display("protocol error on {addr}: {source}"))]
    Protocol {
        addr: String,
        source: ProtocolError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Connect { .. } | Self::ConnectionLost { .. } => StatusCode::ConnectionLost,
            Self::Timeout { .. } => StatusCode::Timeout,
            Self::Protocol { source, .. } => source.status_code(),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
