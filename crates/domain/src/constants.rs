//! Application constants
//!
//! Centralized location for the defaults applied when configuration leaves a
//! value unset.

// Batching
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

// Pagination
pub const DEFAULT_MAX_PAGES: usize = 1000;

// HTTP
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("fieldsync/", env!("CARGO_PKG_VERSION"));

// Retry policy (shared by reads, writes and token refresh)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

// Credentials
pub const DEFAULT_REFRESH_LEEWAY_SECS: i64 = 60;
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CREDENTIAL_DIR: &str = ".fieldsync/credentials";
