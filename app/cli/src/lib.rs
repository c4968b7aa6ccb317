//! Shared pieces of the distbuild executables.

pub mod loadavg;
pub mod logging;
pub mod status_writer;
