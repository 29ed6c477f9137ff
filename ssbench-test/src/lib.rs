//! Test utilities for the benchmark harness crates.
//!
//! See the modules for all available utilities.

pub mod tracing;
