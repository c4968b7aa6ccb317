//! Protocol error type.

use distbuild_error::ErrorExt;
use distbuild_error::Location;
use distbuild_error::StatusCode;
use snafu::Snafu;

/// Errors raised while encoding, decoding or transcoding wire data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum ProtocolError {
    /// Payload ended before a declared field was complete.
    #[snafu(display("truncated frame: needed {needed} more bytes for {what}"))]
    Truncated {
        what: &'static str,
        needed: usize,
        #[snafu(implicit)]
        location: Location,
    },

    /// A length or id field holds a value outside the protocol's limits.
    #[snafu(display("malformed frame: {what}"))]
    Malformed {
        what: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A string field is not valid UTF-8.
    #[snafu(display("frame field {what} is not valid UTF-8"))]
    InvalidUtf8 {
        what: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    /// The envelope declares a codec this build cannot handle.
    #[snafu(display("unsupported compression type: {id}"))]
    UnsupportedCompression {
        id: u8,
        #[snafu(implicit)]
        location: Location,
    },

    /// A codec failed on data that matched its declared type.
    #[snafu(display("{codec} codec failed: {source}"))]
    Codec {
        codec: &'static str,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// The two channel ends disagree on the protocol version.
    #[snafu(display("protocol version mismatch: ours {ours}, peer {theirs}"))]
    VersionMismatch {
        ours: u32,
        theirs: u32,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ErrorExt for ProtocolError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Truncated { .. } | Self::Malformed { .. } | Self::InvalidUtf8 { .. } => {
                StatusCode::FrameMalformed
            }
            Self::UnsupportedCompression { .. } => StatusCode::UnsupportedCompression,
            Self::Codec { .. } => StatusCode::CompressionFailed,
            Self::VersionMismatch { .. } => StatusCode::ProtocolMismatch,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(source: std::io::Error) -> Self {
        use snafu::IntoError;
        protocol_error::CodecSnafu { codec: "io" }.into_error(source)
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
