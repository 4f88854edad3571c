//! Observability infrastructure
//!
//! Sync runs report progress through `tracing` events (`sync.*`,
//! `credential.*`, `reader.*`, `api.*`). This module installs the subscriber
//! that renders them.

pub mod logging;

pub use logging::init_tracing;
