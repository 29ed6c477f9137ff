//! A benchmark driver for object storage services.
//!
//! A [`Scenario`] describes the size classes, the mix of create, read, update, delete and post
//! operations and the concurrency of a run. The [`run`] function executes it against a
//! [`Remote`](remote::Remote) in three phases:
//!
//! 1. *Priming* creates the scenario's initial files. They survive the run.
//! 2. The *run* phase dispatches jobs concurrently. Every job except a creation is completed with
//!    a real target by the shared [`RunState`](ssbench_core::RunState), and skipped if none exists.
//! 3. *Cleanup* deletes every object created during the run phase.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod observability;
pub mod remote;
pub mod runner;
pub mod scenario;

pub use crate::runner::{RunReport, run};
pub use crate::scenario::Scenario;
