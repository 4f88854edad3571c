//! File-backed credential store
//!
//! One JSON file per key at `<dir>/<api>.<application>.json`. Writes go to a
//! temporary file first and are renamed into place; on unix both files are
//! owner-only (0600).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fieldsync_common::auth::{Credential, CredentialError, CredentialKey, CredentialStore};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::lock::StoreLock;

/// [`CredentialStore`] over a directory this process holds exclusively.
#[derive(Debug)]
pub struct FileCredentialStore {
    dir: PathBuf,
    _lock: StoreLock,
}

impl FileCredentialStore {
    /// Creates `dir` if needed and takes its lock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|err| {
            CredentialError::Store(format!("failed to create {}: {err}", dir.display()))
        })?;
        let lock = StoreLock::acquire(&dir)?;
        debug!(dir = %dir.display(), "credential_store.opened");
        Ok(Self { dir, _lock: lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CredentialKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_name()))
    }

    async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, key: &CredentialKey) -> Result<Option<Credential>, CredentialError> {
        let path = self.path_for(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(CredentialError::Store(format!("failed to read {}: {err}", path.display())))
            }
        };

        match serde_json::from_str::<Credential>(&contents) {
            Ok(credential) if credential.key == *key => Ok(Some(credential)),
            Ok(credential) => {
                warn!(path = %path.display(), stored = %credential.key, "credential_store.key_mismatch");
                Ok(None)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "credential_store.unreadable");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &CredentialKey, credential: &Credential) -> Result<(), CredentialError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(credential)
            .map_err(|err| CredentialError::Store(format!("failed to encode credential: {err}")))?;

        Self::write_private(&tmp, &contents)
            .await
            .map_err(|err| CredentialError::Store(format!("failed to write {}: {err}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|err| {
            CredentialError::Store(format!("failed to move credential into {}: {err}", path.display()))
        })?;

        debug!(path = %path.display(), "credential_store.saved");
        Ok(())
    }

    async fn invalidate(&self, key: &CredentialKey) -> Result<(), CredentialError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "credential_store.invalidated");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(CredentialError::Store(format!("failed to remove {}: {err}", path.display())))
            }
        }
    }
}
