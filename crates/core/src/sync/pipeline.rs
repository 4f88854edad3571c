//! Sync pipeline - sequences one run from credential to report

use std::sync::Arc;

use fieldsync_common::auth::CredentialSource;
use fieldsync_domain::{Result, SyncConfig, SyncError, SyncResult, SyncStage, SyncTarget};
use tracing::{debug, info, instrument, warn};

use super::chunker::BatchChunker;
use super::ports::{BatchSubmitter, RecordReader, SyncObserver};
use super::report::SyncReport;
use super::transform::{FieldTransformer, FieldValue};
use crate::errors::map_credential_error;

/// Read, transform, chunk and submit against one target.
///
/// Batches are submitted one at a time in chunk order. Batch-scoped failures
/// are recorded in the report and the run continues; anything else aborts
/// with [`SyncError::Aborted`].
pub struct SyncPipeline {
    credentials: Arc<dyn CredentialSource>,
    reader: Arc<dyn RecordReader>,
    submitter: Arc<dyn BatchSubmitter>,
    chunker: BatchChunker,
    observer: Option<Arc<dyn SyncObserver>>,
}

impl SyncPipeline {
    /// # Errors
    /// Returns `SyncError::Configuration` if `config` is invalid.
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        reader: Arc<dyn RecordReader>,
        submitter: Arc<dyn BatchSubmitter>,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = BatchChunker::from_config(config)?;
        Ok(Self { credentials, reader, submitter, chunker, observer: None })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sets `field` to `value` on every record of the target's collection.
    #[instrument(skip_all, fields(target = %target.name, field = %field))]
    pub async fn run(&self, target: &SyncTarget, field: &str, value: &FieldValue) -> Result<SyncReport> {
        let transformer = Self::prepare(target, field, value)
            .map_err(|err| err.aborted(&target.read.url, SyncStage::Validate, 0))?;
        let mut report = SyncReport::begin(&target.name, field);

        self.credentials
            .acquire(&target.scopes)
            .await
            .map_err(map_credential_error)
            .map_err(|err| err.aborted(&target.read.url, SyncStage::Authorize, 0))?;
        debug!("credential acquired");

        let outcome = self
            .reader
            .read_all(target)
            .await
            .map_err(|err| err.aborted(&target.read.url, SyncStage::Read, 0))?;
        info!(
            records = outcome.records.len(),
            pages = outcome.page_info.pages_fetched,
            "sync.read_complete"
        );
        if let Some(observer) = &self.observer {
            observer.on_read(&outcome.page_info);
        }
        report.page_info = outcome.page_info;

        let transformed = transformer
            .apply_all(&outcome.records)
            .map_err(|err| err.aborted(&target.read.url, SyncStage::Transform, 0))?;
        report.records_transformed = transformed.len();

        let batches = self
            .chunker
            .chunk(transformed)
            .map_err(|err| err.aborted(&target.write.url, SyncStage::Chunk, 0))?;
        info!(batches = batches.len(), max_batch_size = self.chunker.max_batch_size(), "sync.chunked");

        for batch in &batches {
            let result = match self.submitter.submit(target, batch).await {
                Ok(result) => result,
                Err(err) if !err.is_fatal() => SyncResult::failed(
                    batch,
                    err.status(),
                    1,
                    err.category(),
                    err.to_string(),
                ),
                Err(err) => {
                    warn!(batch = batch.index(), error = %err, "sync.aborted");
                    return Err(err.aborted(
                        &target.write.url,
                        SyncStage::Submit,
                        report.batches_submitted(),
                    ));
                }
            };

            if result.is_success() {
                info!(
                    batch = result.batch_index(),
                    records = result.record_count(),
                    attempts = result.attempts(),
                    "sync.batch_submitted"
                );
            } else {
                warn!(
                    batch = result.batch_index(),
                    records = result.record_count(),
                    attempts = result.attempts(),
                    status = ?result.http_status(),
                    "sync.batch_failed"
                );
            }
            if let Some(observer) = &self.observer {
                observer.on_batch(&result);
            }
            report.results.push(result);
        }

        let report = report.finish();
        info!(
            submitted = report.batches_submitted(),
            failed = report.batches_failed(),
            "sync.complete"
        );
        Ok(report)
    }

    fn prepare(target: &SyncTarget, field: &str, value: &FieldValue) -> Result<FieldTransformer> {
        target.validate()?;
        let transformer = FieldTransformer::new(field, value.clone())?;
        transformer.check_identifier(&target.read.id_field)?;
        Ok(transformer)
    }
}
