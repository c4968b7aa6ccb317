//! The tool server: executes compile jobs for remote clients.
//!
//! Each accepted connection streams `RemoteToolRequest` frames; jobs go
//! through the shared [`distbuild_executor::LocalExecutor`], which bounds
//! concurrency at the configured thread count and queues the rest. Every
//! request gets exactly one `RemoteToolResponse` on its own connection, in
//! completion order. A failing tool is a successful response with
//! `success = false`; only transport trouble closes connections.

pub mod server;
pub mod service;

pub use server::{ToolServer, WorkerError};
pub use service::WorkerService;
