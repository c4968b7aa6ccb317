//! MSVC command-line dialect.
//!
//! MSVC attaches arguments to their flags (`/Fofoo.obj`, `/Iinc`), so the
//! walk never consumes a following argument. Flags are accepted with either
//! `/` or `-`.

use crate::commandline::InvokeKind;
use crate::commandline::ToolCommandline;

use super::DialectParser;
use super::retain_args;

pub struct MsvcParser;

fn is_flag(arg: &str) -> bool {
    (arg.starts_with('/') || arg.starts_with('-')) && arg.len() > 1
}

/// `/Fo<path>` (object output) or `/Fi<path>` (preprocess output).
fn is_output_flag(arg: &str) -> bool {
    let body = &arg[1..];
    body.starts_with("Fo") || body.starts_with("Fi")
}

impl DialectParser for MsvcParser {
    fn derive(&self, cmd: &mut ToolCommandline) {
        cmd.reset_indices();
        for (index, arg) in cmd.args.iter().enumerate() {
            if is_flag(arg) {
                let body = &arg[1..];
                match body {
                    "c" => {
                        cmd.kind = InvokeKind::Compile;
                        cmd.invoke_type_index = Some(index);
                    }
                    "E" | "P" => {
                        cmd.kind = InvokeKind::Preprocess;
                        cmd.invoke_type_index = Some(index);
                    }
                    _ if is_output_flag(arg) => cmd.output_index = Some(index),
                    _ => {}
                }
                continue;
            }
            if cmd.input_index.is_some() {
                cmd.reset_indices();
                return;
            }
            cmd.input_index = Some(index);
        }
        let output_valid = cmd
            .output_index
            .is_some_and(|index| index < cmd.args.len());
        if cmd.input_index.is_none() || !output_valid {
            cmd.reset_indices();
        }
    }

    fn set_invoke_kind(&self, cmd: &mut ToolCommandline, kind: InvokeKind) {
        if cmd.kind == InvokeKind::Unknown {
            return;
        }
        if let Some(index) = cmd.invoke_type_index {
            cmd.args[index] = match kind {
                InvokeKind::Preprocess => "/P".to_string(),
                _ => "/c".to_string(),
            };
        }
        // Preprocess output goes through /Fi, object output through /Fo.
        if let Some(index) = cmd.output_index {
            let arg = &cmd.args[index];
            let separator = &arg[..1];
            let path = &arg[3..];
            let selector = match kind {
                InvokeKind::Preprocess => "Fi",
                _ => "Fo",
            };
            cmd.args[index] = format!("{separator}{selector}{path}");
        }
        self.derive(cmd);
    }

    fn strip_dependency_flags(&self, cmd: &mut ToolCommandline) {
        retain_args(cmd, &["/showIncludes", "-showIncludes"], &[], &[]);
        self.derive(cmd);
    }

    fn strip_preprocessor_flags(&self, cmd: &mut ToolCommandline) {
        retain_args(cmd, &[], &[], &["/I", "-I", "/D", "-D"]);
        self.derive(cmd);
    }

    fn strip_local_flags(&self, cmd: &mut ToolCommandline) {
        self.derive(cmd);
    }
}
