//! Paginated collection reader
//!
//! [`PaginatedReader::pages`] is a lazy stream: each poll fetches one page
//! and works out where the next one starts. The stream ends when a page
//! carries no continuation marker.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::{ReadOutcome, RecordReader};
use fieldsync_domain::{
    Entity, Page, PageCursor, PageInfo, PaginationStyle, Result, SyncError, SyncTarget,
};
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::client::ApiClient;

/// Reads every record behind a target's read endpoint.
pub struct PaginatedReader {
    api: Arc<ApiClient>,
    max_pages: usize,
}

struct Traversal {
    next: Option<PageCursor>,
    fetched: usize,
    seen: HashSet<PageCursor>,
    done: bool,
}

impl PaginatedReader {
    pub fn new(api: Arc<ApiClient>, max_pages: usize) -> Self {
        Self { api, max_pages: max_pages.max(1) }
    }

    /// Pages in server order. Errors end the stream.
    pub fn pages<'a>(&'a self, target: &'a SyncTarget) -> impl Stream<Item = Result<Page>> + Send + 'a {
        let mut seen = HashSet::new();
        if matches!(target.read.pagination, PaginationStyle::Offset { .. }) {
            seen.insert(PageCursor::Offset(0));
        }
        let initial = Traversal { next: None, fetched: 0, seen, done: false };

        stream::try_unfold(initial, move |mut state| async move {
            if state.done {
                return Ok(None);
            }
            if state.fetched >= self.max_pages {
                return Err(SyncError::protocol(
                    &target.read.url,
                    format!("no last page after {} page(s)", self.max_pages),
                ));
            }

            let page = self.fetch_page(target, state.fetched + 1, state.next.as_ref()).await?;

            if let Some(next) = &page.next {
                if !state.seen.insert(next.clone()) {
                    return Err(SyncError::protocol(
                        &target.read.url,
                        format!("page {} repeats cursor {next}", page.number),
                    ));
                }
            }

            state.fetched = page.number;
            state.done = page.is_last();
            state.next = page.next.clone();
            Ok(Some((page, state)))
        })
    }

    #[instrument(skip(self, target, cursor), fields(url = %target.read.url))]
    async fn fetch_page(
        &self,
        target: &SyncTarget,
        number: usize,
        cursor: Option<&PageCursor>,
    ) -> Result<Page> {
        let endpoint = &target.read;
        let query = query_for(target, cursor);

        let delivery = self
            .api
            .execute(&endpoint.url, &target.scopes, |http| {
                http.request(Method::GET, &endpoint.url).query(&query)
            })
            .await?;

        let body: Value = serde_json::from_str(&delivery.body).map_err(|err| {
            SyncError::protocol(&endpoint.url, format!("page {number} is not JSON: {err}"))
        })?;
        let Value::Object(body) = body else {
            return Err(SyncError::protocol(&endpoint.url, format!("page {number} is not a JSON object")));
        };

        let raw_records = body.get(&endpoint.records_key).and_then(Value::as_array).ok_or_else(|| {
            SyncError::protocol(
                &endpoint.url,
                format!("page {number} has no '{}' array", endpoint.records_key),
            )
        })?;

        let records = raw_records
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                Entity::from_json(raw.clone(), &endpoint.id_field).map_err(|err| {
                    SyncError::protocol(&endpoint.url, format!("page {number}, record {idx}: {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let page = Page {
            number,
            next: next_cursor(&endpoint.pagination, &body, cursor, records.len()),
            items_per_page: metadata(&endpoint.pagination, &body, MetadataField::ItemsPerPage),
            total_results: metadata(&endpoint.pagination, &body, MetadataField::Total),
            records,
        };
        debug!(
            page = number,
            records = page.records.len(),
            has_next = page.next.is_some(),
            "reader.page_fetched"
        );
        Ok(page)
    }

    /// Collects every page into one ordered record set.
    #[instrument(skip(self, target), fields(target = %target.name))]
    pub async fn read_all(&self, target: &SyncTarget) -> Result<ReadOutcome> {
        let mut records = Vec::new();
        let mut page_info = PageInfo::default();

        let pages = self.pages(target);
        futures::pin_mut!(pages);
        while let Some(mut page) = pages.try_next().await? {
            page_info.record(&page);
            records.append(&mut page.records);
        }

        if page_info.total_mismatch() {
            warn!(
                advertised = ?page_info.total_results,
                read = page_info.records_read,
                "reader.total_mismatch"
            );
        }
        info!(pages = page_info.pages_fetched, records = records.len(), "reader.complete");
        Ok(ReadOutcome { records, page_info })
    }
}

#[async_trait]
impl RecordReader for PaginatedReader {
    async fn read_all(&self, target: &SyncTarget) -> Result<ReadOutcome> {
        PaginatedReader::read_all(self, target).await
    }
}

fn query_for(target: &SyncTarget, cursor: Option<&PageCursor>) -> Vec<(String, String)> {
    let mut query = vec![(target.tenant.name.clone(), target.tenant.value.clone())];
    query.extend(target.read.params.iter().map(|(k, v)| (k.clone(), v.clone())));

    match &target.read.pagination {
        PaginationStyle::Single => {}
        PaginationStyle::Cursor { cursor_param, page_size_param, page_size, .. } => {
            if let (Some(param), Some(size)) = (page_size_param, page_size) {
                query.push((param.clone(), size.to_string()));
            }
            if let Some(PageCursor::Token(token)) = cursor {
                query.push((cursor_param.clone(), token.clone()));
            }
        }
        PaginationStyle::Offset { offset_param, size_param, page_size, one_based, .. } => {
            let offset = match cursor {
                Some(PageCursor::Offset(offset)) => *offset,
                _ => 0,
            };
            query.push((offset_param.clone(), (offset + u64::from(*one_based)).to_string()));
            query.push((size_param.clone(), page_size.to_string()));
        }
    }
    query
}

fn next_cursor(
    style: &PaginationStyle,
    body: &Map<String, Value>,
    current: Option<&PageCursor>,
    page_len: usize,
) -> Option<PageCursor> {
    match style {
        PaginationStyle::Single => None,
        PaginationStyle::Cursor { next_field, .. } => match body.get(next_field)? {
            Value::String(token) if !token.is_empty() => Some(PageCursor::Token(token.clone())),
            Value::Number(token) => Some(PageCursor::Token(token.to_string())),
            _ => None,
        },
        PaginationStyle::Offset { next_field, .. } => {
            if !is_present(body.get(next_field)) {
                return None;
            }
            let offset = match current {
                Some(PageCursor::Offset(offset)) => *offset,
                _ => 0,
            };
            Some(PageCursor::Offset(offset + page_len as u64))
        }
    }
}

enum MetadataField {
    ItemsPerPage,
    Total,
}

fn metadata(style: &PaginationStyle, body: &Map<String, Value>, field: MetadataField) -> Option<u64> {
    let name = match (style, field) {
        (PaginationStyle::Offset { items_per_page_field, .. }, MetadataField::ItemsPerPage) => {
            items_per_page_field.as_ref()
        }
        (PaginationStyle::Offset { total_field, .. }, MetadataField::Total)
        | (PaginationStyle::Cursor { total_field, .. }, MetadataField::Total) => total_field.as_ref(),
        _ => None,
    }?;
    match body.get(name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn offset_target() -> SyncTarget {
        let mut target = SyncTarget::user_events("https://api.example.test", "group-1");
        target.read.pagination = PaginationStyle::offset_links(10);
        target
    }

    #[test]
    fn offset_query_is_one_based_and_carries_tenant() {
        let query = query_for(&offset_target(), Some(&PageCursor::Offset(20)));
        assert!(query.contains(&("app_group_id".into(), "group-1".into())));
        assert!(query.contains(&("start-index".into(), "21".into())));
        assert!(query.contains(&("max-results".into(), "10".into())));
    }

    #[test]
    fn cursor_query_omits_token_on_first_page() {
        let mut target = offset_target();
        target.read.pagination = PaginationStyle::page_token(25);

        let first = query_for(&target, None);
        assert!(!first.iter().any(|(k, _)| k == "pageToken"));
        assert!(first.contains(&("maxResults".into(), "25".into())));

        let later = query_for(&target, Some(&PageCursor::Token("abc".into())));
        assert!(later.contains(&("pageToken".into(), "abc".into())));
    }

    #[test]
    fn offset_advances_by_page_length_while_next_link_present() {
        let style = PaginationStyle::offset_links(10);
        let body = json!({"nextLink": "https://api.example.test/next"});
        let next = next_cursor(&style, body.as_object().unwrap(), Some(&PageCursor::Offset(10)), 10);
        assert_eq!(next, Some(PageCursor::Offset(20)));

        let last = json!({"nextLink": null});
        assert_eq!(next_cursor(&style, last.as_object().unwrap(), None, 5), None);
    }

    #[test]
    fn empty_token_ends_traversal() {
        let style = PaginationStyle::page_token(10);
        let body = json!({"nextPageToken": ""});
        assert_eq!(next_cursor(&style, body.as_object().unwrap(), None, 3), None);
    }

    #[test]
    fn metadata_accepts_numbers_and_numeric_strings() {
        let style = PaginationStyle::offset_links(10);
        let body = json!({"itemsPerPage": 10, "totalResults": "25"});
        let body = body.as_object().unwrap();
        assert_eq!(metadata(&style, body, MetadataField::ItemsPerPage), Some(10));
        assert_eq!(metadata(&style, body, MetadataField::Total), Some(25));
    }
}
