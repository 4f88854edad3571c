//! Shared building blocks for FieldSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime`: async infrastructure (resilience)
//! - `platform`: OAuth credentials (client, PKCE, credential manager)
//! - `test-utils`: in-memory mocks of the auth traits

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "platform", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{Credential, CredentialError, CredentialKey, CredentialManager, CredentialSource};
#[cfg(feature = "runtime")]
pub use resilience::{RetryConfig, RetryDecision, RetryExecutor};
