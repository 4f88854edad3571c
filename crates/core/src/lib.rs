//! # FieldSync Core
//!
//! Pure business logic layer - no HTTP or storage code.
//!
//! This crate contains:
//! - Field transformation and batch chunking
//! - Port interfaces for reading and submitting records
//! - The sync pipeline that sequences a run and builds its report
//!
//! ## Architecture Principles
//! - Depends on `fieldsync-domain` and the credential seam of `fieldsync-common`
//! - All remote I/O via traits implemented in `fieldsync-infra`

pub mod errors;
pub mod sync;

pub use errors::map_credential_error;
pub use sync::chunker::BatchChunker;
pub use sync::pipeline::SyncPipeline;
pub use sync::ports::{BatchSubmitter, ReadOutcome, RecordReader, SyncObserver};
pub use sync::report::SyncReport;
pub use sync::transform::{FieldTransformer, FieldValue};
