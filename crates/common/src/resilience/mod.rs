//! Resilience patterns for fault tolerance
//!
//! Currently a single pattern: retry with exponential backoff and jitter.
//! It is generic over the error type; callers classify their own errors
//! through a [`RetryPolicy`].

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
