//! Effective configuration shapes for every distbuild role.

use std::time::Duration;

use distbuild_protocol::CompressionInfo;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::config_error;

/// Toolchain dialect of a configured tool. Decides how its command lines
/// are parsed and how its version is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainDialect {
    #[default]
    Gcc,
    /// Parses like GCC; probed with `--version` instead of `-dumpversion`.
    Clang,
    Msvc,
    /// Any tool that rewrites the file named by its last argument.
    UpdateFile,
}

/// One tool the local host can offer, under a stable logical id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Stable logical id used for matching clients and workers.
    pub id: String,
    /// Executable names (or paths) recognized as this tool.
    pub names: Vec<String>,
    #[serde(default)]
    pub dialect: ToolchainDialect,
    /// Pinned version string. When set, the version probe is skipped.
    #[serde(default)]
    pub version: Option<String>,
    /// Flags stripped from the command line before remote dispatch.
    #[serde(default)]
    pub remove_remote: Vec<String>,
    /// Flags appended to the command line before remote dispatch.
    #[serde(default)]
    pub append_remote: Vec<String>,
    /// Tool id substituted when dispatching remotely (e.g. a cross tool).
    #[serde(default)]
    pub remote_alias: Option<String>,
    /// Environment-preparing command run before the tool (MSVC vcvars).
    #[serde(default)]
    pub env_command: Option<String>,
}

impl ToolDefinition {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(config_error::ValidationSnafu {
                reason: "tool with empty id".to_string(),
            }
            .build());
        }
        if self.names.is_empty() {
            return Err(config_error::ValidationSnafu {
                reason: format!("tool {} has no executable names", self.id),
            }
            .build());
        }
        Ok(())
    }
}

/// How a client treats multiple configured coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Redundance {
    /// Keep a connection to every coordinator and merge their snapshots.
    #[default]
    All,
    /// Use the first coordinator that accepts a connection.
    Any,
}

fn default_send_info_interval() -> Duration {
    Duration::from_secs(5)
}

/// Where the coordinators live and how often publishers report in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub redundance: Redundance,
    #[serde(with = "humantime_serde", default = "default_send_info_interval")]
    pub send_info_interval: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            hosts: Vec::new(),
            port: 0,
            redundance: Redundance::default(),
            send_info_interval: default_send_info_interval(),
        }
    }
}

impl CoordinatorSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.hosts.is_empty() {
            return Err(config_error::ValidationSnafu {
                reason: "coordinator enabled but no hosts listed".to_string(),
            }
            .build());
        }
        if self.port == 0 {
            return Err(config_error::ValidationSnafu {
                reason: "coordinator enabled but port is 0".to_string(),
            }
            .build());
        }
        Ok(())
    }
}

/// One byte-wise needle/replacement applied to returned object files
/// (e.g. rewriting embedded absolute paths).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePattern {
    pub needle: String,
    pub replacement: String,
}

fn default_queue_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(240)
}

fn default_invocation_attempts() -> u32 {
    2
}

fn default_minimal_remote_tasks() -> usize {
    10
}

/// Remote-tool client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Identifier shown in worker/coordinator status output. Defaults to
    /// the local hostname when empty.
    #[serde(default)]
    pub client_id: String,
    /// How long a request may sit undispatched before failing. The clock
    /// starts when the invocation is submitted, not when a connection
    /// opens.
    #[serde(with = "humantime_serde", default = "default_queue_timeout")]
    pub queue_timeout: Duration,
    /// How long a dispatched request may run before the correlation entry
    /// expires.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Total worker attempts per invocation, first try included.
    #[serde(default = "default_invocation_attempts")]
    pub invocation_attempts: u32,
    /// Below this many queued-or-running remote tasks, a saturated pool
    /// fails fast with NoWorkers instead of queueing.
    #[serde(default = "default_minimal_remote_tasks")]
    pub minimal_remote_tasks: usize,
    /// Refuse remote dispatch when the 1-minute load average exceeds
    /// this. 0 disables the guard.
    #[serde(default)]
    pub max_load_average: f64,
    #[serde(default)]
    pub compression: CompressionInfo,
    #[serde(default)]
    pub coordinator: CoordinatorSettings,
    /// Byte rewrites applied to returned object files before delivery.
    #[serde(default)]
    pub post_process: Vec<ReplacePattern>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            queue_timeout: default_queue_timeout(),
            request_timeout: default_request_timeout(),
            invocation_attempts: default_invocation_attempts(),
            minimal_remote_tasks: default_minimal_remote_tasks(),
            max_load_average: 0.0,
            compression: CompressionInfo::default(),
            coordinator: CoordinatorSettings::default(),
            post_process: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.invocation_attempts == 0 {
            return Err(config_error::ValidationSnafu {
                reason: "invocation_attempts must be at least 1".to_string(),
            }
            .build());
        }
        self.coordinator.validate()
    }
}

fn default_thread_count() -> u16 {
    num_cpus::get() as u16
}

fn default_use_client_compression() -> bool {
    true
}

/// Tool-server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name advertised to coordinators. Defaults to the local hostname.
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub listen_host: String,
    pub listen_port: u16,
    #[serde(default = "default_thread_count")]
    pub thread_count: u16,
    /// Hosts allowed to connect. Empty allows any host.
    #[serde(default)]
    pub host_allowlist: Vec<String>,
    #[serde(default)]
    pub compression: CompressionInfo,
    /// Compress responses with the codec the request used instead of the
    /// worker's own.
    #[serde(default = "default_use_client_compression")]
    pub use_client_compression: bool,
    #[serde(default)]
    pub coordinator: CoordinatorSettings,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            return Err(config_error::ValidationSnafu {
                reason: "worker listen_port is 0".to_string(),
            }
            .build());
        }
        if self.thread_count == 0 {
            return Err(config_error::ValidationSnafu {
                reason: "worker thread_count must be at least 1".to_string(),
            }
            .build());
        }
        self.coordinator.validate()
    }
}

/// Coordinator daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoordinatorServerConfig {
    #[serde(default)]
    pub listen_host: String,
    pub listen_port: u16,
}

impl CoordinatorServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            return Err(config_error::ValidationSnafu {
                reason: "coordinator listen_port is 0".to_string(),
            }
            .build());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "types.test.rs"]
mod tests;
