//! # FieldSync Domain
//!
//! Domain types and models for FieldSync.
//!
//! This crate contains:
//! - Record, page and batch types moved through a sync run
//! - Domain error types and Result definitions
//! - Configuration structures (run limits, targets, OAuth settings)
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other FieldSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
