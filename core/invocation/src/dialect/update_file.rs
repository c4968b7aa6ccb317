//! Dialect for arbitrary file-rewriting tools.
//!
//! The tool's last argument names both its input and its output; there is
//! nothing to split, but the invocation can be shipped whole.

use crate::commandline::InvokeKind;
use crate::commandline::ToolCommandline;

use super::DialectParser;

pub struct UpdateFileParser;

impl DialectParser for UpdateFileParser {
    fn derive(&self, cmd: &mut ToolCommandline) {
        cmd.reset_indices();
        if cmd.args.is_empty() {
            return;
        }
        let last = cmd.args.len() - 1;
        cmd.input_index = Some(last);
        cmd.output_index = Some(last);
        cmd.kind = InvokeKind::Compile;
    }

    fn set_invoke_kind(&self, _cmd: &mut ToolCommandline, _kind: InvokeKind) {}

    fn strip_dependency_flags(&self, _cmd: &mut ToolCommandline) {}

    fn strip_preprocessor_flags(&self, _cmd: &mut ToolCommandline) {}

    fn strip_local_flags(&self, _cmd: &mut ToolCommandline) {}
}
