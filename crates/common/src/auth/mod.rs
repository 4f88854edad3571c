//! OAuth 2.0 + PKCE credential infrastructure
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CredentialManager  │  acquire / invalidate (CredentialSource)
//! └─────────┬───────────┘
//!           │
//!           ├──► OAuthClientTrait     (token endpoint: exchange, refresh)
//!           ├──► CredentialStore      (durable storage per API/application)
//!           └──► AuthorizationFlow    (browser consent, loopback redirect)
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `Credential`, `CredentialKey`, `TokenResponse`, `OAuthConfig`
//! - **[`pkce`]**: PKCE challenge generation
//! - **[`client`]**: OAuth HTTP client for authorization and token exchange
//! - **[`credential_manager`]**: Credential lifecycle with refresh and re-auth
//! - **[`traits`]**: Seams for storage, flows and the token endpoint

pub mod client;
pub mod credential_manager;
pub mod pkce;
pub mod traits;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use credential_manager::{CredentialError, CredentialManager};
pub use pkce::PkceChallenge;
pub use traits::{AuthorizationFlow, CredentialSource, CredentialStore, OAuthClientTrait};
pub use types::{Credential, CredentialKey, OAuthConfig, OAuthError, TokenResponse};
