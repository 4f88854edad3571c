//! Run report

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use fieldsync_domain::{PageInfo, SyncResult};
use serde::Serialize;
use uuid::Uuid;

/// Aggregate of one completed run, in batch order.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub target: String,
    pub field: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub page_info: PageInfo,
    pub records_transformed: usize,
    pub results: Vec<SyncResult>,
}

impl SyncReport {
    pub(crate) fn begin(target: &str, field: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::now_v7(),
            target: target.to_string(),
            field: field.to_string(),
            started_at: now,
            finished_at: now,
            page_info: PageInfo::default(),
            records_transformed: 0,
            results: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn batches_total(&self) -> usize {
        self.results.len()
    }

    pub fn batches_submitted(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn batches_failed(&self) -> usize {
        self.batches_total() - self.batches_submitted()
    }

    pub fn records_submitted(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).map(SyncResult::record_count).sum()
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &SyncResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// True when every batch was accepted (vacuously true for an empty run).
    pub fn is_success(&self) -> bool {
        self.batches_failed() == 0
    }

    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: set '{}' on {} record(s) from {} page(s); {}/{} batch(es) submitted ({} record(s))",
            self.target,
            self.field,
            self.records_transformed,
            self.page_info.pages_fetched,
            self.batches_submitted(),
            self.batches_total(),
            self.records_submitted(),
        )?;
        if self.batches_failed() > 0 {
            write!(f, ", {} failed", self.batches_failed())?;
        }
        Ok(())
    }
}
