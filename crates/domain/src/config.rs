//! Configuration structures
//!
//! Everything a run needs to know is carried by these types; nothing is read
//! from global state once an [`AppSettings`] has been loaded.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_CALLBACK_TIMEOUT_SECS, DEFAULT_CREDENTIAL_DIR,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_PAGES,
    DEFAULT_REFRESH_LEEWAY_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::{Result, SyncError};

/// Run limits shared by every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Requested records per submitted batch.
    pub max_batch_size: usize,
    /// Hard cap accepted by the write endpoint.
    pub api_max_batch_size: usize,
    /// Upper bound on pages fetched in one read.
    pub max_pages: usize,
    pub request_timeout_secs: u64,
    /// Credentials expiring within this many seconds are refreshed early.
    pub refresh_leeway_secs: i64,
    pub retry: RetrySettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            api_max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_leeway_secs: DEFAULT_REFRESH_LEEWAY_SECS,
            retry: RetrySettings::default(),
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks the limits before any I/O happens.
    ///
    /// # Errors
    /// Returns `SyncError::Configuration` for a zero or over-limit batch
    /// size, zero page bound, zero timeout or invalid retry settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(SyncError::Configuration("max_batch_size must be at least 1".into()));
        }
        if self.api_max_batch_size == 0 {
            return Err(SyncError::Configuration("api_max_batch_size must be at least 1".into()));
        }
        if self.max_batch_size > self.api_max_batch_size {
            return Err(SyncError::Configuration(format!(
                "max_batch_size {} exceeds the endpoint limit of {}",
                self.max_batch_size, self.api_max_batch_size
            )));
        }
        if self.max_pages == 0 {
            return Err(SyncError::Configuration("max_pages must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Configuration("request_timeout_secs must be positive".into()));
        }
        if self.refresh_leeway_secs < 0 {
            return Err(SyncError::Configuration("refresh_leeway_secs cannot be negative".into()));
        }
        self.retry.validate()
    }
}

/// Retry policy applied to reads, writes and token refresh alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts for one request, including the first.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SyncError::Configuration("retry.max_attempts must be at least 1".into()));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(SyncError::Configuration(
                "retry.base_backoff_ms cannot exceed retry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

/// A named query/body parameter that scopes requests to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantParam {
    pub name: String,
    pub value: String,
}

/// How a collection endpoint splits its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PaginationStyle {
    /// The whole collection comes back in one response.
    #[default]
    Single,
    /// Continuation token returned in `next_field`, echoed in `cursor_param`.
    Cursor {
        cursor_param: String,
        next_field: String,
        #[serde(default)]
        page_size_param: Option<String>,
        #[serde(default)]
        page_size: Option<u32>,
        #[serde(default)]
        total_field: Option<String>,
    },
    /// Start-index paging; another page exists while `next_field` is present.
    Offset {
        offset_param: String,
        size_param: String,
        page_size: u32,
        /// First index is 1 instead of 0.
        #[serde(default)]
        one_based: bool,
        next_field: String,
        #[serde(default)]
        items_per_page_field: Option<String>,
        #[serde(default)]
        total_field: Option<String>,
    },
}

impl PaginationStyle {
    /// `pageToken` / `nextPageToken` paging.
    pub fn page_token(page_size: u32) -> Self {
        Self::Cursor {
            cursor_param: "pageToken".to_string(),
            next_field: "nextPageToken".to_string(),
            page_size_param: Some("maxResults".to_string()),
            page_size: Some(page_size),
            total_field: None,
        }
    }

    /// `start-index` / `max-results` paging with a `nextLink` marker.
    pub fn offset_links(page_size: u32) -> Self {
        Self::Offset {
            offset_param: "start-index".to_string(),
            size_param: "max-results".to_string(),
            page_size,
            one_based: true,
            next_field: "nextLink".to_string(),
            items_per_page_field: Some("itemsPerPage".to_string()),
            total_field: Some("totalResults".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEndpoint {
    pub url: String,
    /// Response key holding the record array.
    pub records_key: String,
    /// Field carrying each record's unique identifier.
    pub id_field: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub pagination: PaginationStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEndpoint {
    pub url: String,
    /// Request body key the batch records are placed under.
    pub records_key: String,
}

/// One remote collection to read, transform and write back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    pub name: String,
    pub tenant: TenantParam,
    pub scopes: Vec<String>,
    pub read: ReadEndpoint,
    pub write: WriteEndpoint,
}

impl SyncTarget {
    /// User attribute export/track pair of a tenant-scoped user store.
    pub fn user_attributes(base_url: &str, app_group_id: impl Into<String>) -> Self {
        Self::tenant_collection(base_url, app_group_id, "attributes", "external_id")
    }

    /// User event export/track pair of a tenant-scoped user store.
    pub fn user_events(base_url: &str, app_group_id: impl Into<String>) -> Self {
        Self::tenant_collection(base_url, app_group_id, "events", "event_id")
    }

    fn tenant_collection(
        base_url: &str,
        app_group_id: impl Into<String>,
        key: &str,
        id_field: &str,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            name: format!("user_{key}"),
            tenant: TenantParam { name: "app_group_id".to_string(), value: app_group_id.into() },
            scopes: vec![format!("users.{key}")],
            read: ReadEndpoint {
                url: format!("{base}/users/{key}"),
                records_key: key.to_string(),
                id_field: id_field.to_string(),
                params: BTreeMap::new(),
                pagination: PaginationStyle::Single,
            },
            write: WriteEndpoint {
                url: format!("{base}/users/track"),
                records_key: key.to_string(),
            },
        }
    }

    /// Checks the target before any I/O happens.
    ///
    /// # Errors
    /// Returns `SyncError::Configuration` naming the first missing piece.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("tenant.name", &self.tenant.name),
            ("tenant.value", &self.tenant.value),
            ("read.url", &self.read.url),
            ("read.records_key", &self.read.records_key),
            ("read.id_field", &self.read.id_field),
            ("write.url", &self.write.url),
            ("write.records_key", &self.write.records_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::Configuration(format!(
                    "target '{}': {name} is required",
                    self.name
                )));
            }
        }
        if self.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(SyncError::Configuration(format!(
                "target '{}': at least one scope is required",
                self.name
            )));
        }
        match &self.read.pagination {
            PaginationStyle::Offset { page_size: 0, .. }
            | PaginationStyle::Cursor { page_size: Some(0), .. } => {
                Err(SyncError::Configuration(format!(
                    "target '{}': page size must be positive",
                    self.name
                )))
            }
            _ => Ok(()),
        }
    }
}

/// OAuth2 client registration and endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default = "default_authorize_params")]
    pub extra_authorize_params: BTreeMap<String, String>,
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
}

fn default_authorize_params() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("access_type".to_string(), "offline".to_string()),
        ("prompt".to_string(), "consent".to_string()),
    ])
}

const fn default_callback_timeout() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_SECS
}

impl OAuthSettings {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

/// Where and under which name credentials are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSettings {
    #[serde(default = "default_credential_dir")]
    pub dir: PathBuf,
    /// API the credential grants access to.
    pub api: String,
    /// Application identity the credential belongs to.
    pub application: String,
}

fn default_credential_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CREDENTIAL_DIR)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Top-level settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub sync: SyncConfig,
    pub oauth: OAuthSettings,
    pub credentials: CredentialSettings,
    pub target: SyncTarget,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppSettings {
    /// # Errors
    /// Returns `SyncError::Configuration` for the first invalid section.
    pub fn validate(&self) -> Result<()> {
        self.sync.validate()?;
        self.target.validate()?;
        if self.oauth.client_id.trim().is_empty() {
            return Err(SyncError::Configuration("oauth.client_id is required".into()));
        }
        if self.oauth.token_endpoint.trim().is_empty() {
            return Err(SyncError::Configuration("oauth.token_endpoint is required".into()));
        }
        if self.credentials.api.trim().is_empty() || self.credentials.application.trim().is_empty()
        {
            return Err(SyncError::Configuration(
                "credentials.api and credentials.application are required".into(),
            ));
        }
        Ok(())
    }
}
