//! Dialect-specific command-line derivation.
//!
//! Each toolchain dialect knows how to classify an invocation, where its
//! input and output live, and which flags belong to the preprocessor, the
//! dependency writer, or the local host only. Everything else in the crate
//! is dialect-agnostic and dispatches through [`DialectParser`].

mod gcc;
mod msvc;
mod update_file;

use distbuild_config::ToolchainDialect;

use crate::commandline::InvokeKind;
use crate::commandline::ToolCommandline;

pub use gcc::GccParser;
pub use msvc::MsvcParser;
pub use update_file::UpdateFileParser;

/// The operations a dialect must provide. Every method re-derives the
/// commandline's indices before returning, keeping its invariant intact.
pub trait DialectParser: Send + Sync {
    /// Derive kind, input index and output index from the current
    /// arguments. On any ambiguity (two positional inputs, missing
    /// output) the commandline resets to `Unknown`.
    fn derive(&self, cmd: &mut ToolCommandline);

    /// Flip a classified invocation between preprocess and compile by
    /// rewriting its type flag in place. No-op on `Unknown` commandlines.
    fn set_invoke_kind(&self, cmd: &mut ToolCommandline, kind: InvokeKind);

    /// Remove flags that emit dependency files (`-MMD`, `-MF x`, ...).
    fn strip_dependency_flags(&self, cmd: &mut ToolCommandline);

    /// Remove preprocessor-only flags (`-I`, `-D`, include roots, ...).
    fn strip_preprocessor_flags(&self, cmd: &mut ToolCommandline);

    /// Remove flags that only make sense on the invoking host.
    fn strip_local_flags(&self, cmd: &mut ToolCommandline);
}

/// Dialect dispatch. Clang parses exactly like GCC; the difference between
/// the two is confined to version probing.
pub fn parser_for(dialect: ToolchainDialect) -> &'static dyn DialectParser {
    match dialect {
        ToolchainDialect::Gcc | ToolchainDialect::Clang => &GccParser,
        ToolchainDialect::Msvc => &MsvcParser,
        ToolchainDialect::UpdateFile => &UpdateFileParser,
    }
}

/// Shared argument-removal walk: drops exact matches, prefix matches and
/// flags that consume their following argument.
fn retain_args(
    cmd: &mut ToolCommandline,
    remove_exact: &[&str],
    remove_consuming: &[&str],
    remove_prefixes: &[&str],
) {
    let mut kept = Vec::with_capacity(cmd.args.len());
    let mut skip_next = false;
    for arg in &cmd.args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if remove_exact.contains(&arg.as_str()) {
            continue;
        }
        if remove_consuming.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if remove_prefixes.iter().any(|prefix| arg.starts_with(prefix)) {
            continue;
        }
        kept.push(arg.clone());
    }
    cmd.args = kept;
}

#[cfg(test)]
#[path = "dialect.test.rs"]
mod tests;
