//! Port interfaces for sync operations

use async_trait::async_trait;
use fieldsync_domain::{Batch, Entity, PageInfo, Result, SyncResult, SyncTarget};

/// Everything a complete read produced.
#[derive(Debug, Clone, Default)]
pub struct ReadOutcome {
    pub records: Vec<Entity>,
    pub page_info: PageInfo,
}

/// Reads the full collection behind a target's read endpoint.
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Traverses every page in order. Any error aborts the read.
    async fn read_all(&self, target: &SyncTarget) -> Result<ReadOutcome>;
}

/// Writes one batch to a target's write endpoint.
#[async_trait]
pub trait BatchSubmitter: Send + Sync {
    /// Returns a result for batch-scoped outcomes (success, exhausted
    /// retries, client rejection) and `Err` only for failures that must end
    /// the run.
    async fn submit(&self, target: &SyncTarget, batch: &Batch) -> Result<SyncResult>;
}

/// Progress callback for a run.
pub trait SyncObserver: Send + Sync {
    fn on_read(&self, _page_info: &PageInfo) {}

    fn on_batch(&self, result: &SyncResult);
}
