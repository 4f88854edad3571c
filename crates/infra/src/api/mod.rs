//! Remote collection API
//!
//! Bearer-authenticated reads and writes against the target's endpoints.
//!
//! # Architecture
//!
//! - [`ApiClient`] owns retry, backoff and the one-shot 401 re-authorization
//! - [`PaginatedReader`] implements `RecordReader` on top of it
//! - [`UpdateSubmitter`] implements `BatchSubmitter` on top of it
//! - Every call goes through [`crate::http::HttpClient`] (timeout on every send)

pub mod client;
pub mod errors;
pub mod reader;
pub mod submitter;

pub use client::{ApiClient, Delivery, DeliveryFailure};
pub use errors::{ApiError, ApiErrorCategory};
pub use reader::PaginatedReader;
pub use submitter::UpdateSubmitter;
