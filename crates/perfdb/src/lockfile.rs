//! Named advisory lock shared across threads and processes.
//!
//! OS file locks are per-process, so every thread of a process must funnel
//! through one lock object per path for reader/writer exclusion to hold
//! between them. [`LockFile::get`] promotes lock objects to a process-wide
//! registry keyed by the canonical path.

use anyhow::{Context, Result};
use fs2::FileExt;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

static REGISTRY: Lazy<Mutex<HashMap<PathBuf, Arc<LockFile>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Default)]
struct LockState {
    readers: u32,
    writer: bool,
}

/// A shared/exclusive lock backed by an advisory OS lock on a sidecar file.
///
/// The OS lock is held whenever any thread of the process holds a guard:
/// the first reader (and every writer) acquires it, the last reader (and
/// every writer) releases it. Readers never wait on queued writers, so a
/// thread already holding a shared guard may take another one. Upgrading
/// shared to exclusive is not supported; release first.
pub struct LockFile {
    file: File,
    path: PathBuf,
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockFile {
    /// Returns the process-wide lock object for `path`, creating the file
    /// on first use.
    pub fn get(path: &Path) -> Result<Arc<Self>> {
        let mut registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;
        // Canonicalize after creation so relative and absolute spellings of
        // the same path share one entry.
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if let Some(existing) = registry.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let lock = Arc::new(LockFile {
            file,
            path: key.clone(),
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        });
        registry.insert(key, Arc::clone(&lock));
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the lock in shared mode. Blocks while a writer holds it.
    pub fn shared(&self) -> Result<SharedGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.writer {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.readers == 0 {
            // First reader takes the OS lock; later readers piggyback.
            self.file
                .lock_shared()
                .with_context(|| format!("failed to lock {} (shared)", self.path.display()))?;
        }
        state.readers += 1;
        Ok(SharedGuard { lock: self })
    }

    /// Acquires the lock in exclusive mode. Blocks until every holder in
    /// this and every other process has released.
    pub fn exclusive(&self) -> Result<ExclusiveGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.writer || state.readers > 0 {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.writer = true;
        // No guard of this lock exists at this point, so holding the state
        // mutex across the (possibly blocking) OS acquisition cannot
        // deadlock: contending threads have to wait for the OS lock anyway.
        if let Err(e) = self.file.lock_exclusive() {
            state.writer = false;
            self.released.notify_all();
            return Err(e)
                .with_context(|| format!("failed to lock {} (exclusive)", self.path.display()));
        }
        Ok(ExclusiveGuard { lock: self })
    }

    fn release_shared(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.readers -= 1;
        if state.readers == 0 {
            if let Err(e) = FileExt::unlock(&self.file) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to unlock lock file");
            }
            self.released.notify_all();
        }
    }

    fn release_exclusive(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.writer = false;
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to unlock lock file");
        }
        self.released.notify_all();
    }
}

/// Releases the shared hold on drop, on every exit path.
pub struct SharedGuard<'a> {
    lock: &'a LockFile,
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_shared();
    }
}

/// Releases the exclusive hold on drop, on every exit path.
pub struct ExclusiveGuard<'a> {
    lock: &'a LockFile,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_exclusive();
    }
}
