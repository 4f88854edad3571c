//! Submission batches

use serde::Serialize;

use super::entity::Entity;
use crate::errors::SyncError;

/// An ordered, non-empty group of entities submitted in one request.
///
/// Batches are only built through [`Batch::new`], which enforces the size
/// bound, so a `Batch` in hand is always valid to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    index: usize,
    entities: Vec<Entity>,
}

impl Batch {
    pub fn new(index: usize, entities: Vec<Entity>, max_size: usize) -> Result<Self, SyncError> {
        if entities.is_empty() {
            return Err(SyncError::Internal(format!("batch {index} is empty")));
        }
        if entities.len() > max_size {
            return Err(SyncError::Internal(format!(
                "batch {index} holds {} records, limit is {max_size}",
                entities.len()
            )));
        }
        Ok(Self { index, entities })
    }

    /// 0-based position of the batch within its run.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn first_id(&self) -> Option<&str> {
        self.entities.first().map(Entity::id)
    }

    pub fn last_id(&self) -> Option<&str> {
        self.entities.last().map(Entity::id)
    }
}
