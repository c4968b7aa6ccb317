//! Tool version probing.
//!
//! Workers and clients must agree on the exact toolchain build before a
//! compile leaves the host, so each side reduces every configured tool to
//! one canonical version string: the pinned value from config when there
//! is one, otherwise the output of a dialect-specific probe run through
//! the local executor.

pub mod checker;

pub use checker::VersionChecker;
