//! Invocation error type.

use distbuild_error::ErrorExt;
use distbuild_error::Location;
use distbuild_error::StatusCode;
use snafu::Snafu;

/// Errors raised while recognizing or rewriting command lines.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum InvocationError {
    /// The command line cannot be classified; the caller must run it
    /// locally, unchanged.
    #[snafu(display("command line not splittable: {reason}"))]
    Rejected {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The leading executable matches no configured tool.
    #[snafu(display("no configured tool named {name}"))]
    UnknownTool {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ErrorExt for InvocationError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected { .. } => StatusCode::ParserRejected,
            Self::UnknownTool { .. } => StatusCode::InvalidArguments,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Result type for invocation operations.
pub type Result<T> = std::result::Result<T, InvocationError>;
