//! Tool resolution and preprocess/compile splitting.

use std::path::PathBuf;

use distbuild_config::ToolDefinition;

use crate::commandline::InvokeKind;
use crate::commandline::ToolCommandline;
use crate::commandline::ToolId;
use crate::dialect::parser_for;
use crate::error::Result;
use crate::error::invocation_error;

/// The two halves of a split compile: `preprocess` runs locally and writes
/// the preprocessed source; `compile` ships to a worker with the
/// preprocessed source as its input.
#[derive(Debug, Clone)]
pub struct SplitInvocation {
    pub preprocess: ToolCommandline,
    pub compile: ToolCommandline,
}

/// Resolves raw command lines against the configured tool set and rewrites
/// them for remote execution.
#[derive(Debug, Clone, Default)]
pub struct InvocationRewriter {
    tools: Vec<ToolDefinition>,
}

impl InvocationRewriter {
    pub fn new(tools: Vec<ToolDefinition>) -> Self {
        Self { tools }
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.id.clone()).collect()
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn tool_by_id(&self, id: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.id == id)
    }

    fn tool_by_executable(&self, executable: &str) -> Option<&ToolDefinition> {
        let stem = std::path::Path::new(executable)
            .file_name()
            .and_then(|os| os.to_str())
            .unwrap_or(executable);
        self.tools
            .iter()
            .find(|tool| tool.names.iter().any(|n| n == executable || n == stem))
    }

    /// Recognize a raw argv. `argv[0]` names the executable; the remainder
    /// are the tool's arguments.
    pub fn recognize(&self, argv: &[String]) -> Result<ToolCommandline> {
        let (executable, args) = argv
            .split_first()
            .ok_or_else(|| invocation_error::RejectedSnafu {
                reason: "empty command line".to_string(),
            }.build())?;
        let tool = self.tool_by_executable(executable).ok_or_else(|| {
            invocation_error::UnknownToolSnafu {
                name: executable.clone(),
            }
            .build()
        })?;
        let mut cmd = ToolCommandline::new(
            ToolId::new(tool.id.clone(), PathBuf::from(executable)),
            tool.dialect,
            args.to_vec(),
        );
        parser_for(cmd.dialect).derive(&mut cmd);
        Ok(cmd)
    }

    /// Build a commandline for a tool known by id — the worker side, where
    /// only `(tool_id, args)` arrive over the wire and the executable is
    /// whatever this host configured for the id.
    pub fn parse(&self, tool_id: &str, args: Vec<String>) -> Result<ToolCommandline> {
        let tool = self
            .tool_by_id(tool_id)
            .ok_or_else(|| {
                invocation_error::UnknownToolSnafu {
                    name: tool_id.to_string(),
                }
                .build()
            })?;
        let executable = tool.names.first().cloned().unwrap_or_default();
        let mut cmd = ToolCommandline::new(
            ToolId::new(tool.id.clone(), PathBuf::from(executable)),
            tool.dialect,
            args,
        );
        parser_for(cmd.dialect).derive(&mut cmd);
        Ok(cmd)
    }

    /// Split a compile into its preprocess and remote-compile halves.
    ///
    /// The preprocess half keeps every preprocessor flag, loses the
    /// dependency-file flags and writes to `preprocessed_path`. The compile
    /// half loses every preprocessor-only and local-only flag and reads
    /// from `preprocessed_path`. A command that is not a single-input
    /// compile is rejected; the caller falls back to plain local
    /// execution.
    pub fn split(&self, cmd: &ToolCommandline, preprocessed_path: &str) -> Result<SplitInvocation> {
        if cmd.kind != InvokeKind::Compile {
            return Err(invocation_error::RejectedSnafu {
                reason: format!("not a compile: {}", cmd.display_args()),
            }
            .build());
        }
        if cmd.invoke_type_index.is_none() {
            // UpdateFile commandlines classify as Compile but have no type
            // flag to flip; they ship whole instead of splitting.
            return Err(invocation_error::RejectedSnafu {
                reason: "tool dialect has no preprocess step".to_string(),
            }
            .build());
        }
        let parser = parser_for(cmd.dialect);

        let mut preprocess = cmd.clone();
        parser.set_invoke_kind(&mut preprocess, InvokeKind::Preprocess);
        parser.strip_dependency_flags(&mut preprocess);
        preprocess.set_output(preprocessed_path);

        let mut compile = cmd.clone();
        parser.strip_preprocessor_flags(&mut compile);
        parser.strip_dependency_flags(&mut compile);
        parser.strip_local_flags(&mut compile);
        compile.set_input(preprocessed_path);

        if preprocess.kind != InvokeKind::Preprocess
            || compile.kind != InvokeKind::Compile
            || preprocess.output().is_none()
            || compile.input().is_none()
        {
            return Err(invocation_error::RejectedSnafu {
                reason: format!("split collapsed: {}", cmd.display_args()),
            }
            .build());
        }
        Ok(SplitInvocation {
            preprocess,
            compile,
        })
    }

    /// Apply the tool's configured transforms to a remote-bound half:
    /// remove flags the workers must not see, append the ones they need,
    /// and swap in the remote tool alias.
    pub fn prepare_remote(&self, cmd: &mut ToolCommandline) {
        let Some(tool) = self.tool_by_id(&cmd.tool.tool_id) else {
            return;
        };
        if !tool.remove_remote.is_empty() {
            cmd.args
                .retain(|arg| !tool.remove_remote.contains(arg));
        }
        for arg in &tool.append_remote {
            cmd.args.push(arg.clone());
        }
        if let Some(alias) = &tool.remote_alias {
            cmd.tool.tool_id = alias.clone();
        }
        parser_for(cmd.dialect).derive(cmd);
    }
}

#[cfg(test)]
#[path = "rewriter.test.rs"]
mod tests;
