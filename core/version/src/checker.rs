//! The version checker.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use distbuild_config::ToolDefinition;
use distbuild_config::ToolchainDialect;
use distbuild_executor::LocalExecutor;
use distbuild_executor::LocalTask;
use distbuild_invocation::InvocationRewriter;
use distbuild_invocation::ToolCommandline;
use distbuild_invocation::ToolId;
use regex::Regex;
use tracing::debug;
use tracing::warn;

/// `9.3.0`, `12.0.1`, `10.2` — the GNU-ish dotted form.
static VERSION_GNU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.[0-9.]+").unwrap());

/// `19.29.30133 for x64` — the cl.exe banner form.
static VERSION_MSVC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+(\.\d+)? for \w+").unwrap());

/// Probes configured tools for their canonical version strings.
pub struct VersionChecker {
    executor: LocalExecutor,
    rewriter: InvocationRewriter,
}

impl VersionChecker {
    pub fn new(executor: LocalExecutor, rewriter: InvocationRewriter) -> Self {
        Self { executor, rewriter }
    }

    /// Produce the `tool id -> version` map. `only` restricts the probe to
    /// the named ids; empty means every configured tool.
    pub async fn determine_tool_versions(&self, only: &[String]) -> BTreeMap<String, String> {
        let mut versions = BTreeMap::new();
        for tool in self.rewriter.tools() {
            if !only.is_empty() && !only.contains(&tool.id) {
                continue;
            }
            if let Some(pinned) = &tool.version {
                versions.insert(tool.id.clone(), pinned.clone());
                continue;
            }
            let version = self.probe(tool).await;
            debug!(tool = %tool.id, %version, "tool version determined");
            versions.insert(tool.id.clone(), version);
        }
        versions
    }

    /// Run the dialect-specific probe. Unprobeable dialects and failed
    /// probes produce the empty version, which only matches workers that
    /// report the same.
    async fn probe(&self, tool: &ToolDefinition) -> String {
        let args: Vec<String> = match tool.dialect {
            ToolchainDialect::UpdateFile => return String::new(),
            ToolchainDialect::Clang => vec!["--version".to_string()],
            ToolchainDialect::Gcc => {
                vec!["-dumpfullversion".to_string(), "-dumpversion".to_string()]
            }
            // cl.exe prints its banner when run bare under vcvars.
            ToolchainDialect::Msvc => Vec::new(),
        };
        let Some(executable) = resolve_executable(tool) else {
            return String::new();
        };

        let invocation = ToolCommandline::new(
            ToolId::new(tool.id.clone(), executable),
            tool.dialect,
            args,
        );
        let mut task = LocalTask::new(invocation);
        // The banner goes to stderr for cl.exe and to stdout for the GNU
        // family; GNU tools also print warnings there that would confuse
        // the regex.
        task.capture_stderr = tool.dialect == ToolchainDialect::Msvc;
        task.env_command = tool.env_command.clone();

        let result = self.executor.exec(task).await;
        if !result.success {
            warn!(tool = %tool.id, output = %result.std_out, "version probe failed");
            return String::new();
        }
        let pattern = match tool.dialect {
            ToolchainDialect::Msvc => &VERSION_MSVC,
            _ => &VERSION_GNU,
        };
        pattern
            .find(&result.std_out)
            .map(|found| found.as_str().to_string())
            .unwrap_or_default()
    }
}

/// First configured name, resolved through PATH when it is bare.
fn resolve_executable(tool: &ToolDefinition) -> Option<PathBuf> {
    let name = tool.names.first()?;
    let path = PathBuf::from(name);
    if path.is_absolute() {
        return Some(path);
    }
    match which::which(name) {
        Ok(resolved) => Some(resolved),
        Err(_) => Some(path),
    }
}

#[cfg(test)]
#[path = "checker.test.rs"]
mod tests;
