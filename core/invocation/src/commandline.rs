//! The parsed command line and its derived indices.

use std::path::PathBuf;

use distbuild_config::ToolchainDialect;
use serde::Deserialize;
use serde::Serialize;

/// Stable logical tool id plus the executable that realizes it on this
/// host. The id travels over the wire; the executable never does — each
/// host resolves its own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolId {
    pub tool_id: String,
    pub executable: PathBuf,
}

impl ToolId {
    pub fn new(tool_id: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            tool_id: tool_id.into(),
            executable: executable.into(),
        }
    }
}

/// What a command line asks the tool to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvokeKind {
    /// Not a recognizable single-input compile; must run locally as-is.
    #[default]
    Unknown,
    Preprocess,
    Compile,
}

/// An argument list with its derived indices.
///
/// Invariant: after construction and after every mutating method, either
/// both `input_index` and `output_index` point at existing arguments and
/// `kind` is `Preprocess`/`Compile`, or all three are reset (`None`,
/// `None`, `Unknown`). Callers never see a half-derived state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolCommandline {
    pub tool: ToolId,
    pub dialect: ToolchainDialect,
    pub args: Vec<String>,
    pub kind: InvokeKind,
    pub input_index: Option<usize>,
    pub output_index: Option<usize>,
    /// Index of the argument that selects `kind` (`-c` / `-E`), kept so the
    /// kind can be flipped in place.
    pub(crate) invoke_type_index: Option<usize>,
}

/// Prefixes that attach an output path to a single argument (MSVC style).
const OUTPUT_PREFIXES: &[&str] = &["/Fo", "-Fo", "/Fi", "-Fi"];

impl ToolCommandline {
    pub fn new(tool: ToolId, dialect: ToolchainDialect, args: Vec<String>) -> Self {
        Self {
            tool,
            dialect,
            args,
            kind: InvokeKind::Unknown,
            input_index: None,
            output_index: None,
            invoke_type_index: None,
        }
    }

    /// Reset the derived indices. Dialect parsers call this before
    /// re-deriving.
    pub(crate) fn reset_indices(&mut self) {
        self.kind = InvokeKind::Unknown;
        self.input_index = None;
        self.output_index = None;
        self.invoke_type_index = None;
    }

    /// The input argument, when derived.
    pub fn input(&self) -> Option<&str> {
        self.input_index.map(|i| self.args[i].as_str())
    }

    /// The output path, when derived. Strips an attached `/Fo`-style
    /// prefix.
    pub fn output(&self) -> Option<&str> {
        let arg = self.args[self.output_index?].as_str();
        for prefix in OUTPUT_PREFIXES {
            if let Some(path) = arg.strip_prefix(prefix) {
                return Some(path);
            }
        }
        Some(arg)
    }

    /// Replace the input argument. The indices stay valid: the argument
    /// list's shape does not change.
    pub fn set_input(&mut self, path: &str) {
        if let Some(index) = self.input_index {
            self.args[index] = path.to_string();
        }
    }

    /// Replace the output path, preserving an attached prefix.
    pub fn set_output(&mut self, path: &str) {
        let Some(index) = self.output_index else {
            return;
        };
        let arg = &self.args[index];
        for prefix in OUTPUT_PREFIXES {
            if arg.starts_with(prefix) {
                self.args[index] = format!("{prefix}{path}");
                return;
            }
        }
        self.args[index] = path.to_string();
    }

    /// Render as a shell-like string for logs.
    pub fn display_args(&self) -> String {
        self.args.join(" ")
    }

    /// True when the derived state allows remote splitting.
    pub fn is_compile(&self) -> bool {
        self.kind == InvokeKind::Compile
    }
}

#[cfg(test)]
#[path = "commandline.test.rs"]
mod tests;
