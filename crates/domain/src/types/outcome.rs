//! Per-batch submission outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::Batch;
use crate::errors::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Submitted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub category: ErrorCategory,
    pub detail: String,
}

/// Outcome of submitting one batch. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    batch_index: usize,
    record_count: usize,
    status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u16>,
    attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<BatchError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_id: Option<String>,
    completed_at: DateTime<Utc>,
}

impl SyncResult {
    pub fn submitted(batch: &Batch, http_status: u16, attempts: u32) -> Self {
        Self::build(batch, BatchStatus::Submitted, Some(http_status), attempts, None)
    }

    pub fn failed(
        batch: &Batch,
        http_status: Option<u16>,
        attempts: u32,
        category: ErrorCategory,
        detail: impl Into<String>,
    ) -> Self {
        let error = BatchError { category, detail: detail.into() };
        Self::build(batch, BatchStatus::Failed, http_status, attempts, Some(error))
    }

    fn build(
        batch: &Batch,
        status: BatchStatus,
        http_status: Option<u16>,
        attempts: u32,
        error: Option<BatchError>,
    ) -> Self {
        Self {
            batch_index: batch.index(),
            record_count: batch.len(),
            status,
            http_status,
            attempts,
            error,
            first_id: batch.first_id().map(str::to_string),
            last_id: batch.last_id().map(str::to_string),
            completed_at: Utc::now(),
        }
    }

    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Submitted
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&BatchError> {
        self.error.as_ref()
    }

    pub fn first_id(&self) -> Option<&str> {
        self.first_id.as_deref()
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}
