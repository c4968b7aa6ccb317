//! Coordinator service and client.
//!
//! The service is a pure in-memory registry: workers publish their status,
//! the registry replaces records in place, evicts a worker when its
//! connection drops, and fans the full snapshot out to every connected
//! peer with mutations coalesced into one broadcast.
//!
//! The client maintains connections to one (`Any`) or all (`All`)
//! configured coordinators, merges their snapshots with latest-wins
//! semantics, and hands each merged snapshot to an `info_arrived`
//! callback. A client can also be a publisher, reporting its own status on
//! an interval.

pub mod client;
pub mod service;

pub use client::{CoordinatorClient, InfoCallback, StatusSource};
pub use service::CoordinatorService;
