//! Unified error classification for the distbuild crates.
//!
//! Every crate defines its own snafu error enum and maps each variant to a
//! [`StatusCode`] through [`ErrorExt`]. The status code carries the metadata
//! the schedulers act on: whether a failure is worth retrying on another
//! worker, and whether it should be logged as an error.

pub mod ext;
pub mod status_code;

pub use ext::{BoxedError, ErrorExt, PlainError, boxed};
pub use snafu::Location;
pub use status_code::{StatusCategory, StatusCode, StatusMeta};
