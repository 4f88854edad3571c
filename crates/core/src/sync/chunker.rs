//! Batch chunking

use fieldsync_domain::{Batch, Entity, Result, SyncConfig, SyncError};

/// Splits records into ordered batches of at most `max_batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchChunker {
    max_batch_size: usize,
}

impl BatchChunker {
    /// # Errors
    /// Returns `SyncError::Configuration` if the size is zero or exceeds
    /// what the endpoint accepts.
    pub fn new(max_batch_size: usize, api_max_batch_size: usize) -> Result<Self> {
        if max_batch_size == 0 {
            return Err(SyncError::Configuration("batch size must be at least 1".into()));
        }
        if max_batch_size > api_max_batch_size {
            return Err(SyncError::Configuration(format!(
                "batch size {max_batch_size} exceeds the endpoint limit of {api_max_batch_size}"
            )));
        }
        Ok(Self { max_batch_size })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(config.max_batch_size, config.api_max_batch_size)
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Every batch but the last is full; concatenating the batches yields
    /// `entities` unchanged. No records means no batches.
    pub fn chunk(&self, entities: Vec<Entity>) -> Result<Vec<Batch>> {
        let mut batches = Vec::with_capacity(entities.len().div_ceil(self.max_batch_size));
        let mut remaining = entities.into_iter().peekable();

        while remaining.peek().is_some() {
            let group: Vec<Entity> = remaining.by_ref().take(self.max_batch_size).collect();
            batches.push(Batch::new(batches.len(), group, self.max_batch_size)?);
        }

        Ok(batches)
    }
}
