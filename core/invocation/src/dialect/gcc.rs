//! GCC/Clang command-line dialect.

use crate::commandline::InvokeKind;
use crate::commandline::ToolCommandline;

use super::DialectParser;
use super::retain_args;

/// Flags that consume the following argument and are neither input nor
/// output themselves.
const CONSUMES_NEXT: &[&str] = &[
    "-MF",
    "-MT",
    "-isysroot",
    "-target",
    "-isystem",
    "-iframework",
    "--serialize-diagnostics",
    "-index-store-path",
    "-arch",
];

/// Preprocessor flags with the argument attached (`-Iinc`, `-DFOO=1`,
/// `-Fframework`).
const PREPROCESSOR_PREFIXES: &[&str] = &["-I", "-D", "-F"];

/// Preprocessor flags that consume the following argument.
const PREPROCESSOR_CONSUMING: &[&str] = &[
    "-isysroot",
    "-iframework",
    "-isystem",
    "--serialize-diagnostics",
    "-index-store-path",
];

pub struct GccParser;

impl DialectParser for GccParser {
    fn derive(&self, cmd: &mut ToolCommandline) {
        cmd.reset_indices();
        let mut skip_next = false;
        for (index, arg) in cmd.args.iter().enumerate() {
            if skip_next {
                skip_next = false;
                continue;
            }
            if arg.len() > 1 && arg.starts_with('-') {
                match arg.as_str() {
                    "-c" => {
                        cmd.kind = InvokeKind::Compile;
                        cmd.invoke_type_index = Some(index);
                    }
                    "-E" => {
                        cmd.kind = InvokeKind::Preprocess;
                        cmd.invoke_type_index = Some(index);
                    }
                    "-o" => {
                        cmd.output_index = Some(index + 1);
                        skip_next = true;
                    }
                    "-x" => skip_next = true,
                    flag if CONSUMES_NEXT.contains(&flag) => skip_next = true,
                    _ => {}
                }
                continue;
            }
            if cmd.input_index.is_some() {
                // Two positional inputs: multi-source invocations are not
                // remoteable.
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
                InvokeKind::Preprocess => "-E".to_string(),
                _ => "-c".to_string(),
            };
        }
        self.derive(cmd);
    }

    fn strip_dependency_flags(&self, cmd: &mut ToolCommandline) {
        retain_args(cmd, &["-MMD", "-MD"], &["-MF", "-MT"], &[]);
        self.derive(cmd);
    }

    fn strip_preprocessor_flags(&self, cmd: &mut ToolCommandline) {
        retain_args(
            cmd,
            &[],
            PREPROCESSOR_CONSUMING,
            PREPROCESSOR_PREFIXES,
        );
        self.derive(cmd);
    }

    fn strip_local_flags(&self, cmd: &mut ToolCommandline) {
        retain_args(cmd, &[], &["-index-store-path"], &[]);
        self.derive(cmd);
    }
}
