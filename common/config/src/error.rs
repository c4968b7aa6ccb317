//! Configuration error type.

use distbuild_error::ErrorExt;
use distbuild_error::Location;
use distbuild_error::StatusCode;
use snafu::Snafu;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum ConfigError {
    #[snafu(display("failed to read config file {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to parse config file {path}: {source}"))]
    TomlParse {
        path: String,
        source: toml::de::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid configuration: {reason}"))]
    Validation {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Io { .. } | Self::TomlParse { .. } => StatusCode::ConfigFileError,
            Self::Validation { .. } => StatusCode::InvalidConfig,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
