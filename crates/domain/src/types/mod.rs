//! Data types moved through a sync run

pub mod batch;
pub mod entity;
pub mod outcome;
pub mod page;

pub use batch::Batch;
pub use entity::{Entity, EntityError};
pub use outcome::{BatchError, BatchStatus, SyncResult};
pub use page::{Page, PageCursor, PageInfo};
