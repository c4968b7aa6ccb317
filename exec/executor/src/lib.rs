//! Bounded local subprocess pool.
//!
//! Tasks queue without limit; at most `max_workers` subprocesses run at a
//! time, admitted in FIFO order. A task can stage input bytes to a scratch
//! file before it runs and read its output file back afterwards; scratch
//! files are gone by the time the callback fires. Setup and spawn errors
//! become failed results, never pool crashes.

pub mod executor;
pub mod task;

pub use executor::LocalExecutor;
pub use task::{LocalTask, TaskCallback, TaskResult};
