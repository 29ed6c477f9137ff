//! Shared run state for a storage benchmark harness.
//!
//! During a benchmark, a driver dispatches create, read, update, delete and post jobs against a
//! storage backend. Every job except a creation must target an object that really exists. The
//! [`RunState`] registry tracks those objects per size class. It serves targets round-robin for
//! reads and updates and consumes them for deletes. Afterwards it hands back the objects created
//! during the timed run so they can be cleaned up.
//!
//! The crate contains no I/O. It consumes [`OperationResult`]s and produces filled-in [`Job`]s.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod records;
pub mod run_state;
pub mod template;

pub use crate::records::{Job, ObjectInfo, Operation, OperationResult};
pub use crate::run_state::{DEFAULT_POST_COUNTER, RunState};
pub use crate::template::{ContentTemplate, TemplateError};
