//! Configuration for the distbuild executables.
//!
//! One TOML file describes every role; each binary reads its own section.
//! Loading goes through three stages: parse the file, apply environment
//! overrides, validate. Validation failures abort startup.
//!
//! ```toml
//! temp_dir = "/tmp/distbuild"
//!
//! [[tools]]
//! id = "gcc9"
//! names = ["gcc-9", "g++-9"]
//! dialect = "gcc"
//!
//! [coordinator]
//! hosts = ["coord1.lan", "coord2.lan"]
//! port = 7700
//! redundance = "any"
//! send_info_interval = "5s"
//!
//! [client]
//! queue_timeout = "10s"
//! request_timeout = "240s"
//!
//! [worker]
//! listen_port = 7767
//! thread_count = 8
//! ```

pub mod error;
pub mod file;
pub mod types;

pub use error::{ConfigError, Result};
pub use file::{ConfigFile, default_config_path, find_config, load_config};
pub use types::{
    ClientConfig, CoordinatorServerConfig, CoordinatorSettings, Redundance, ReplacePattern,
    ToolDefinition, ToolchainDialect, WorkerConfig,
};
