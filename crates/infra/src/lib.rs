//! # FieldSync Infrastructure
//!
//! Infrastructure implementations of core sync ports.
//!
//! This crate contains:
//! - HTTP transport with timeouts, retry and 401 re-authorization
//! - Paginated reader and batch submitter for remote record collections
//! - File-backed credential store and loopback OAuth authorization
//! - Configuration loading, logging setup and service wiring
//!
//! ## Architecture
//! - Implements traits defined in `fieldsync-core` and `fieldsync-common`
//! - Contains all "impure" code (network, file system)

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, ApiError, ApiErrorCategory, PaginatedReader, UpdateSubmitter};
pub use auth::LoopbackAuthorizationFlow;
pub use bootstrap::{retry_config_from, SyncService};
pub use config::ConfigError;
pub use credentials::{FileCredentialStore, StoreLock};
pub use http::HttpClient;
pub use observability::init_tracing;
