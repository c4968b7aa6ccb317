//! Compiler command-line understanding.
//!
//! A [`ToolCommandline`] is an argument list plus three derived facts: the
//! invocation kind (preprocess, compile, or unrecognized), the input
//! argument's index and the output argument's index. The derivation is
//! dialect-specific and re-run after every mutation, so the indices are
//! always consistent with the current argument list.
//!
//! [`InvocationRewriter`] sits on top: it resolves which configured tool a
//! raw command line belongs to and splits a compile into its preprocess and
//! remote-compile halves.

pub mod commandline;
pub mod dialect;
pub mod error;
pub mod rewriter;

pub use commandline::{InvokeKind, ToolCommandline, ToolId};
pub use dialect::{DialectParser, parser_for};
pub use error::{InvocationError, Result};
pub use rewriter::{InvocationRewriter, SplitInvocation};
