//! The remote-tool client: worker selection, retry and failover.
//!
//! The client holds the latest merged worker snapshot from the
//! coordinators, opens one persistent connection per worker on first use,
//! and schedules each invocation onto the worker with the most free
//! threads. Transport failures (lost connections, request timeouts) are
//! retried on a different worker while attempts remain; a compile that the
//! remote tool itself rejected is deterministic and never retried.

pub mod client;
pub mod selection;

pub use client::{InvokeOutcome, RemoteToolClient};
pub use selection::{SelectionOutcome, select_worker};
