//! Testing utilities and helpers
//!
//! - **[`mocks`]**: In-memory implementations of the auth traits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use fieldsync_common::auth::CredentialSource;
//! use fieldsync_common::testing::StaticCredentialSource;
//!
//! let source = Arc::new(StaticCredentialSource::new(["token-1", "token-2"]));
//! let credential = source.acquire(&["read".to_string()]).await.unwrap();
//! assert_eq!(credential.access_token, "token-1");
//!
//! source.invalidate().await.unwrap();
//! let credential = source.acquire(&["read".to_string()]).await.unwrap();
//! assert_eq!(credential.access_token, "token-2");
//! ```

pub mod mocks;

pub use mocks::{
    credential_fixture, MemoryCredentialStore, MockAuthorizationFlow, MockOAuthClient,
    StaticCredentialSource,
};
