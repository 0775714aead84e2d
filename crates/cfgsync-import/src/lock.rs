//! Import lock
//!
//! At most one import may mutate a target storage at a time. The importer
//! asks a [`LockBackend`] for a guard before the first step and keeps it
//! until the last step or the first failure. Acquisition never blocks: a
//! held lock is reported as contention right away.

use crate::error::{ImportError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs4::fs_std::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Source of exclusive, non-blocking locks keyed by name
pub trait LockBackend: Send + Sync {
    /// Take the lock, or return `None` if someone else holds it
    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>>;

    /// Whether the lock is currently held by anyone
    fn is_locked(&self, key: &str) -> Result<bool>;
}

/// Held lock, released when dropped
pub struct LockGuard {
    key: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    fn new(key: &str, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            key: key.to_string(),
            release: Some(Box::new(release)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!("Released lock {}", self.key);
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

/// In-process lock table
///
/// Clones share the same table, so every importer given a clone contends
/// for the same keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockBackend {
    held: Arc<Mutex<HashSet<String>>>,
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockBackend for MemoryLockBackend {
    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.to_string()) {
            return Ok(None);
        }
        debug!("Acquired lock {}", key);

        let table = Arc::clone(&self.held);
        let owned = key.to_string();
        Ok(Some(LockGuard::new(key, move || {
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&owned);
        })))
    }

    fn is_locked(&self, key: &str) -> Result<bool> {
        Ok(self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key))
    }
}

/// OS file locks on `<dir>/<key>.lock`
///
/// Works across processes. The lock file is left in place after release.
#[derive(Debug, Clone)]
pub struct FileLockBackend {
    dir: Utf8PathBuf,
}

impl FileLockBackend {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn open(&self, key: &str) -> Result<File> {
        let lock_error = |e: std::io::Error| ImportError::Lock {
            key: key.to_string(),
            message: e.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(lock_error)?;
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(format!("{}.lock", key)))
            .map_err(lock_error)
    }
}

impl LockBackend for FileLockBackend {
    fn try_acquire(&self, key: &str) -> Result<Option<LockGuard>> {
        let file = self.open(key)?;
        match file.try_lock_exclusive() {
            Ok(true) => {
                debug!("Acquired file lock {} in {}", key, self.dir);
                Ok(Some(LockGuard::new(key, move || {
                    let _ = FileExt::unlock(&file);
                })))
            }
            Ok(false) => Ok(None),
            Err(e) => Err(ImportError::Lock {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn is_locked(&self, key: &str) -> Result<bool> {
        if !self.dir.join(format!("{}.lock", key)).exists() {
            return Ok(false);
        }
        Ok(self.try_acquire(key)?.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_lock_is_exclusive() {
        let backend = MemoryLockBackend::new();
        let other = backend.clone();

        let guard = backend.try_acquire("config_importer").unwrap().unwrap();
        assert_eq!(guard.key(), "config_importer");
        assert!(other.try_acquire("config_importer").unwrap().is_none());
        assert!(other.is_locked("config_importer").unwrap());
        // other keys are independent
        assert!(other.try_acquire("other").unwrap().is_some());

        drop(guard);
        assert!(!other.is_locked("config_importer").unwrap());
        assert!(other.try_acquire("config_importer").unwrap().is_some());
    }

    #[test]
    fn test_file_lock_is_exclusive() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let first = FileLockBackend::new(dir.clone());
        let second = FileLockBackend::new(dir);

        assert!(!second.is_locked("config_importer").unwrap());
        let guard = first.try_acquire("config_importer").unwrap().unwrap();
        assert!(second.try_acquire("config_importer").unwrap().is_none());
        assert!(second.is_locked("config_importer").unwrap());

        drop(guard);
        assert!(!second.is_locked("config_importer").unwrap());
    }

    #[test]
    fn test_file_lock_held_against_other_handles() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let backend = FileLockBackend::new(dir.clone());

        let guard = backend.try_acquire("config_importer").unwrap().unwrap();
        let raw = File::open(dir.join("config_importer.lock")).unwrap();
        assert!(!raw.try_lock_exclusive().unwrap());

        drop(guard);
        assert!(raw.try_lock_exclusive().unwrap());
        assert!(backend.try_acquire("config_importer").unwrap().is_none());
        FileExt::unlock(&raw).unwrap();
        assert!(backend.try_acquire("config_importer").unwrap().is_some());
    }

    #[test]
    fn test_file_lock_unwritable_dir_is_lock_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("state");
        fs::write(&blocker, "not a directory").unwrap();
        let dir = Utf8PathBuf::from_path_buf(blocker).unwrap();

        let err = FileLockBackend::new(dir)
            .try_acquire("config_importer")
            .unwrap_err();
        assert!(matches!(err, ImportError::Lock { ref key, .. } if key == "config_importer"));
    }
}
