//! Config file location, loading and environment overrides.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use tracing::debug;

use crate::error::Result;
use crate::error::config_error;
use crate::types::ClientConfig;
use crate::types::CoordinatorServerConfig;
use crate::types::ToolDefinition;
use crate::types::WorkerConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DISTBUILD_CONFIG";

/// Environment variable overriding the scratch directory.
pub const TEMP_DIR_ENV: &str = "DISTBUILD_TEMP_DIR";

/// Default config file name under the home directory.
const CONFIG_FILE: &str = ".distbuild.toml";

/// The one TOML document shared by every executable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Scratch directory for staged inputs and preprocessed files.
    /// Defaults to the system temp directory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub tools: Vec<ToolDefinition>,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub worker: Option<WorkerConfig>,

    #[serde(default)]
    pub coordinator_server: Option<CoordinatorServerConfig>,
}

impl ConfigFile {
    /// Validate every section that is present. Tool ids must be unique and
    /// every tool needs at least one executable name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            tool.validate()?;
            if !seen.insert(tool.id.as_str()) {
                return Err(config_error::ValidationSnafu {
                    reason: format!("duplicate tool id {}", tool.id),
                }
                .build());
            }
        }
        self.client.validate()?;
        if let Some(worker) = &self.worker {
            worker.validate()?;
        }
        if let Some(coordinator) = &self.coordinator_server {
            coordinator.validate()?;
        }
        Ok(())
    }

    /// The scratch directory, after defaults.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join("distbuild")
    }

    /// Look a tool up by id.
    pub fn tool_by_id(&self, id: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.id == id)
    }

    /// Look a tool up by one of its executable names. Matches either the
    /// full name or the file stem of a path-like name.
    pub fn tool_by_name(&self, name: &str) -> Option<&ToolDefinition> {
        let stem = Path::new(name)
            .file_name()
            .and_then(|os| os.to_str())
            .unwrap_or(name);
        self.tools
            .iter()
            .find(|tool| tool.names.iter().any(|n| n == name || n == stem))
    }

    /// All configured tool ids, in file order.
    pub fn tool_ids(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.id.clone()).collect()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(TEMP_DIR_ENV) {
            if !dir.is_empty() {
                self.temp_dir = Some(PathBuf::from(dir));
            }
        }
    }
}

/// Default config path: `$HOME/.distbuild.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE)
}

/// Resolve the config path: explicit argument, then `DISTBUILD_CONFIG`,
/// then the default location.
pub fn find_config(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    default_config_path()
}

/// Load, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path).context(config_error::IoSnafu {
        path: path.display().to_string(),
    })?;
    let mut config: ConfigFile = toml::from_str(&text).context(config_error::TomlParseSnafu {
        path: path.display().to_string(),
    })?;
    config.apply_env_overrides();
    config.validate()?;
    debug!(path = %path.display(), tools = config.tools.len(), "loaded config");
    Ok(config)
}

#[cfg(test)]
#[path = "file.test.rs"]
mod tests;
