//! In-memory backend.
//!
//! [`MemoryFs`] resolves every request before returning, which makes it the
//! backend of choice for tests and for worlds that never touch disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Completion, FsError, FsWork, Storage};

/// A map of path to file contents behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<String, Vec<u8>>>,
    read_only: AtomicBool,
}

impl MemoryFs {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the contents of `path` directly, bypassing read-only mode.
    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.files().insert(path.to_owned(), bytes);
    }

    /// Copy of the contents of `path`, if present.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files().get(path).cloned()
    }

    /// Whether `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.files().contains_key(path)
    }

    /// Delete `path`, returning its former contents.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files().remove(path)
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files().len()
    }

    /// Whether the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    /// Make every subsequent [`Storage::write`] fail with [`FsError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }
}

impl Storage for MemoryFs {
    fn read(&self, path: &str) -> FsWork {
        let outcome = match self.get(path) {
            Some(buffer) => {
                let size = buffer.len();
                Ok(Completion { buffer, size })
            }
            None => Err(FsError::NotFound {
                path: path.to_owned(),
            }),
        };
        FsWork::completed(path, outcome)
    }

    fn write(&self, path: &str, bytes: Vec<u8>) -> FsWork {
        if self.read_only.load(Ordering::Relaxed) {
            return FsWork::completed(
                path,
                Err(FsError::ReadOnly {
                    path: path.to_owned(),
                }),
            );
        }
        let size = bytes.len();
        self.insert(path, bytes);
        FsWork::completed(
            path,
            Ok(Completion {
                buffer: Vec::new(),
                size,
            }),
        )
    }
}
