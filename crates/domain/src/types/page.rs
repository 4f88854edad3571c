//! Pagination types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// Opaque position of the next page, as handed back by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PageCursor {
    /// Continuation token (`nextPageToken` style).
    Token(String),
    /// Start index of the next page (`start-index` style).
    Offset(u64),
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(token) => write!(f, "token:{token}"),
            Self::Offset(offset) => write!(f, "offset:{offset}"),
        }
    }
}

/// One fetched page of records.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based position of the page in the traversal.
    pub number: usize,
    pub records: Vec<Entity>,
    pub next: Option<PageCursor>,
    pub items_per_page: Option<u64>,
    pub total_results: Option<u64>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Pagination metadata gathered over a whole read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub pages_fetched: usize,
    pub records_read: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
}

impl PageInfo {
    /// Folds a page into the running totals. The first advertised total is
    /// kept; later pages cannot replace it.
    pub fn record(&mut self, page: &Page) {
        self.pages_fetched += 1;
        self.records_read += page.records.len();
        if page.items_per_page.is_some() {
            self.items_per_page = page.items_per_page;
        }
        if self.total_results.is_none() {
            self.total_results = page.total_results;
        }
    }

    /// True when the server advertised a total that differs from what was read.
    pub fn total_mismatch(&self) -> bool {
        self.total_results.is_some_and(|total| total != self.records_read as u64)
    }
}
