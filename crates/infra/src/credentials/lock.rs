//! Exclusive store lock using a PID file
//!
//! Keeps two runners from sharing one credential directory. A lock left
//! behind by a process that no longer exists is reclaimed.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fieldsync_common::auth::CredentialError;

const LOCK_FILE: &str = "fieldsync.lock";

/// How long a lock file without a readable PID is presumed to be mid-write.
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(10);

/// Held for the lifetime of a credential store; removes its file on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Fails if another live process holds the lock for `dir`.
    pub fn acquire(dir: &Path) -> Result<Self, CredentialError> {
        let path = dir.join(LOCK_FILE);

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let pid = std::process::id();
                    write!(file, "{pid}").map_err(|err| {
                        CredentialError::Store(format!("failed to write {}: {err}", path.display()))
                    })?;
                    tracing::debug!(pid, path = %path.display(), "store_lock.acquired");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    Self::reclaim_if_stale(&path)?;
                }
                Err(err) => {
                    return Err(CredentialError::Store(format!(
                        "failed to create {}: {err}",
                        path.display()
                    )));
                }
            }
        }

        Err(CredentialError::Store(format!("could not acquire {}", path.display())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reclaim_if_stale(path: &Path) -> Result<(), CredentialError> {
        let holder = fs::read_to_string(path).ok().and_then(|content| content.trim().parse::<u32>().ok());

        match holder {
            Some(pid) if is_process_running(pid) => {
                tracing::warn!(existing_pid = pid, path = %path.display(), "store_lock.held");
                return Err(CredentialError::Store(format!(
                    "credential store is in use by process {pid} ({})",
                    path.display()
                )));
            }
            Some(pid) => tracing::warn!(stale_pid = pid, "store_lock.stale_lock_detected"),
            // A holder may have created the file and not yet written its PID.
            None if !is_older_than(path, UNREADABLE_LOCK_GRACE) => {
                tracing::warn!(path = %path.display(), "store_lock.holder_unknown");
                return Err(CredentialError::Store(format!(
                    "credential store is being locked by another process ({})",
                    path.display()
                )));
            }
            None => tracing::warn!(path = %path.display(), "store_lock.abandoned_lock_detected"),
        }

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CredentialError::Store(format!(
                "failed to remove stale lock {}: {err}",
                path.display()
            ))),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(error = %err, path = %self.path.display(), "store_lock.remove_failed");
        } else {
            tracing::debug!(path = %self.path.display(), "store_lock.released");
        }
    }
}

fn is_older_than(path: &Path, age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|elapsed| elapsed > age)
}

#[cfg(target_os = "linux")]
fn is_process_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_running(pid: u32) -> bool {
    use std::process::Command;

    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_process_running(pid: u32) -> bool {
    // No cheap liveness probe; treat any recorded holder as alive.
    tracing::warn!(pid, "store_lock.process_check_unsupported");
    true
}
