//! Durable credential storage

pub mod file_store;
pub mod lock;

pub use file_store::FileCredentialStore;
pub use lock::StoreLock;
