//! Configuration loader
//!
//! Loads [`AppSettings`] from a TOML or JSON file, then applies environment
//! overrides and validates the result.
//!
//! ## Loading Strategy
//! 1. Read `.env` from the working directory if present (`dotenvy`)
//! 2. Use `FIELDSYNC_CONFIG` if set, otherwise probe the standard locations
//! 3. Parse by extension (`.toml` or `.json`)
//! 4. Apply environment overrides
//! 5. Validate
//!
//! ## Environment Overrides
//! - `FIELDSYNC_MAX_BATCH_SIZE`: records per write request
//! - `FIELDSYNC_REQUEST_TIMEOUT_SECS`: per-request timeout
//! - `FIELDSYNC_MAX_ATTEMPTS`: total sends per request before giving up
//! - `FIELDSYNC_CLIENT_SECRET`: OAuth client secret (kept out of files)
//! - `FIELDSYNC_CREDENTIAL_DIR`: credential store directory
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./fieldsync.toml` or `./fieldsync.json`
//! 2. `./config.toml` or `./config.json`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use fieldsync_domain::{AppSettings, SyncError};
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "FIELDSYNC_CONFIG";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["fieldsync.toml", "fieldsync.json", "config.toml", "config.json"];

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("No config file found; set {CONFIG_PATH_VAR} or create fieldsync.toml")]
    NoConfigFile,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} in {path}: {message}")]
    Parse { path: PathBuf, format: &'static str, message: String },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidOverride { var: &'static str, value: String },

    #[error(transparent)]
    Invalid(#[from] SyncError),
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(inner) => inner,
            other => Self::Configuration(other.to_string()),
        }
    }
}

/// Load settings using the full strategy described above.
///
/// # Errors
/// Returns [`ConfigError`] if no file is found, it cannot be parsed, an
/// override is malformed, or the result fails validation.
pub fn load() -> Result<AppSettings, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded environment from .env");
    }

    let path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
    load_from_file(path)
}

/// Load settings from `path`, or from the first probed location.
///
/// # Errors
/// See [`load`].
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppSettings, ConfigError> {
    let config_path = match path {
        Some(p) if !p.exists() => return Err(ConfigError::NotFound(p)),
        Some(p) => p,
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    let mut settings = parse_settings(&contents, &config_path)?;
    apply_env_overrides(&mut settings)?;
    settings.validate()?;
    Ok(settings)
}

/// Parse settings, choosing the format by file extension.
fn parse_settings(contents: &str, path: &Path) -> Result<AppSettings, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            format: "TOML",
            message: e.to_string(),
        }),
        "json" => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            format: "JSON",
            message: e.to_string(),
        }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Overlay `FIELDSYNC_*` variables onto loaded settings.
///
/// # Errors
/// Returns [`ConfigError::InvalidOverride`] for values that do not parse.
pub fn apply_env_overrides(settings: &mut AppSettings) -> Result<(), ConfigError> {
    if let Some(size) = env_parse("FIELDSYNC_MAX_BATCH_SIZE")? {
        settings.sync.max_batch_size = size;
    }
    if let Some(secs) = env_parse("FIELDSYNC_REQUEST_TIMEOUT_SECS")? {
        settings.sync.request_timeout_secs = secs;
    }
    if let Some(attempts) = env_parse("FIELDSYNC_MAX_ATTEMPTS")? {
        settings.sync.retry.max_attempts = attempts;
    }
    if let Some(secret) = env_string("FIELDSYNC_CLIENT_SECRET") {
        settings.oauth.client_secret = Some(secret);
    }
    if let Some(dir) = env_string("FIELDSYNC_CREDENTIAL_DIR") {
        settings.credentials.dir = PathBuf::from(dir);
    }
    Ok(())
}

/// Probe the standard locations for a config file.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    env_string(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidOverride { var: key, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use parking_lot::Mutex;
    use tempfile::Builder;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const TOML_SETTINGS: &str = r#"
[sync]
max_batch_size = 25

[oauth]
client_id = "installed-app"
authorization_endpoint = "https://auth.example.test/authorize"
token_endpoint = "https://auth.example.test/token"

[credentials]
api = "users"
application = "fieldsync-tests"

[target]
name = "user_attributes"
scopes = ["users.attributes"]

[target.tenant]
name = "app_group_id"
value = "group-1"

[target.read]
url = "https://api.example.test/users/attributes"
records_key = "attributes"
id_field = "external_id"

[target.read.pagination]
style = "offset"
offset_param = "start-index"
size_param = "max-results"
page_size = 100
one_based = true
next_field = "nextLink"

[target.write]
url = "https://api.example.test/users/track"
records_key = "attributes"
"#;

    fn write_config(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn clear_overrides() {
        for var in [
            "FIELDSYNC_MAX_BATCH_SIZE",
            "FIELDSYNC_REQUEST_TIMEOUT_SECS",
            "FIELDSYNC_MAX_ATTEMPTS",
            "FIELDSYNC_CLIENT_SECRET",
            "FIELDSYNC_CREDENTIAL_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_file_toml() {
        let _guard = ENV_LOCK.lock();
        clear_overrides();
        let file = write_config(TOML_SETTINGS, ".toml");

        let settings = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(settings.sync.max_batch_size, 25);
        assert_eq!(settings.sync.max_pages, 1000);
        assert_eq!(settings.oauth.extra_authorize_params.get("access_type").map(String::as_str), Some("offline"));
        assert_eq!(settings.target.read.id_field, "external_id");
        assert!(matches!(
            settings.target.read.pagination,
            fieldsync_domain::PaginationStyle::Offset { page_size: 100, one_based: true, .. }
        ));
    }

    #[test]
    fn test_env_overrides_win() {
        let _guard = ENV_LOCK.lock();
        clear_overrides();
        std::env::set_var("FIELDSYNC_MAX_BATCH_SIZE", "10");
        std::env::set_var("FIELDSYNC_MAX_ATTEMPTS", "2");
        std::env::set_var("FIELDSYNC_CLIENT_SECRET", "from-env");
        let file = write_config(TOML_SETTINGS, ".toml");

        let settings = load_from_file(Some(file.path().to_path_buf()));
        clear_overrides();
        let settings = settings.unwrap();

        assert_eq!(settings.sync.max_batch_size, 10);
        assert_eq!(settings.sync.retry.max_attempts, 2);
        assert_eq!(settings.oauth.client_secret.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let _guard = ENV_LOCK.lock();
        clear_overrides();
        std::env::set_var("FIELDSYNC_MAX_BATCH_SIZE", "lots");
        let file = write_config(TOML_SETTINGS, ".toml");

        let result = load_from_file(Some(file.path().to_path_buf()));
        clear_overrides();

        assert!(matches!(result, Err(ConfigError::InvalidOverride { var: "FIELDSYNC_MAX_BATCH_SIZE", .. })));
    }

    #[test]
    fn test_invalid_settings_fail_validation() {
        let _guard = ENV_LOCK.lock();
        clear_overrides();
        let file = write_config(&TOML_SETTINGS.replace("max_batch_size = 25", "max_batch_size = 0"), ".toml");

        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(SyncError::Configuration(_))));
        assert!(matches!(SyncError::from(err), SyncError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/fieldsync.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_parse_settings_json() {
        let json = r#"{
            "oauth": {"client_id": "c", "authorization_endpoint": "https://a/auth", "token_endpoint": "https://a/token"},
            "credentials": {"api": "users", "application": "app"},
            "target": {
                "name": "events",
                "tenant": {"name": "app_group_id", "value": "g"},
                "scopes": ["users.events"],
                "read": {"url": "https://x/users/events", "records_key": "events", "id_field": "event_id"},
                "write": {"url": "https://x/users/track", "records_key": "events"}
            }
        }"#;

        let settings = parse_settings(json, Path::new("fieldsync.json")).unwrap();
        assert_eq!(settings.target.write.records_key, "events");
        assert_eq!(settings.sync, fieldsync_domain::SyncConfig::default());
    }

    #[test]
    fn test_parse_settings_invalid_and_unsupported() {
        assert!(matches!(
            parse_settings("{ not json", Path::new("fieldsync.json")),
            Err(ConfigError::Parse { format: "JSON", .. })
        ));
        assert!(matches!(
            parse_settings("a: b", Path::new("fieldsync.yaml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
