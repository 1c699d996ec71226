//! Slotworld FS -- blocking-handle file service used by the world codec.
//!
//! Every request returns an [`FsWork`] handle immediately. The handle can be
//! polled with [`FsWork::is_done`] or blocked on with [`FsWork::wait`]; once
//! resolved it exposes the result, the buffer that was read, and the number
//! of bytes transferred.
//!
//! Two backends implement [`Storage`]:
//!
//! - [`FileSystem`] runs all file I/O on a dedicated worker thread fed by a
//!   bounded request queue.
//! - [`MemoryFs`] keeps files in a map and resolves requests on the spot.
//!
//! # Quick Start
//!
//! ```
//! use slotworld_fs::prelude::*;
//!
//! let fs = MemoryFs::new();
//! let mut work = fs.write("savegame", vec![1, 2, 3]);
//! assert!(work.result().is_ok());
//!
//! let data = fs.read("savegame").into_buffer().unwrap();
//! assert_eq!(data, vec![1, 2, 3]);
//! ```

#![deny(unsafe_code)]

pub mod file;
pub mod memory;

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

pub use file::{FileSystem, FsConfig};
pub use memory::MemoryFs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by storage requests.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The requested file does not exist.
    #[error("file '{path}' not found")]
    NotFound { path: String },

    /// The operating system reported an I/O failure.
    #[error("i/o failure on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The path is absolute or climbs out of the storage root.
    #[error("path '{path}' does not stay under the storage root")]
    InvalidPath { path: String },

    /// The store refuses writes.
    #[error("storage is read-only, cannot write '{path}'")]
    ReadOnly { path: String },

    /// The worker thread went away before answering the request.
    #[error("storage worker stopped before completing request for '{path}'")]
    WorkerStopped { path: String },

    /// The worker thread could not be started.
    #[error("failed to spawn storage worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// A configuration document could not be parsed.
    #[error("invalid storage configuration: {0}")]
    Config(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// A blocking read/write service addressed by path.
///
/// Implementations may run the request anywhere (inline, on a worker thread)
/// but must always resolve the returned [`FsWork`] exactly once.
pub trait Storage {
    /// Request the full contents of `path`.
    fn read(&self, path: &str) -> FsWork;

    /// Request that `bytes` replace the contents of `path`.
    fn write(&self, path: &str, bytes: Vec<u8>) -> FsWork;
}

// ---------------------------------------------------------------------------
// Completion / FsWork
// ---------------------------------------------------------------------------

/// Payload of a successfully completed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Bytes read. Empty for writes.
    pub buffer: Vec<u8>,
    /// Bytes transferred (read or written).
    pub size: usize,
}

/// Outcome delivered by a backend for one request.
pub type FsOutcome = Result<Completion, FsError>;

/// Handle to one outstanding storage request.
#[derive(Debug)]
pub struct FsWork {
    path: String,
    rx: Receiver<FsOutcome>,
    outcome: Option<FsOutcome>,
}

impl FsWork {
    /// Create a pending handle plus the sender the backend resolves it with.
    pub fn pending(path: &str) -> (Self, Sender<FsOutcome>) {
        let (tx, rx) = mpsc::channel();
        let work = Self {
            path: path.to_owned(),
            rx,
            outcome: None,
        };
        (work, tx)
    }

    /// Create an already-resolved handle.
    pub fn completed(path: &str, outcome: FsOutcome) -> Self {
        let (mut work, _tx) = Self::pending(path);
        work.outcome = Some(outcome);
        work
    }

    /// Path this request was issued for.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-blocking check for completion.
    pub fn is_done(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.outcome = Some(Err(FsError::WorkerStopped {
                    path: self.path.clone(),
                }));
                true
            }
        }
    }

    /// Block until the request has completed and return its outcome.
    pub fn wait(&mut self) -> &FsOutcome {
        let Self { path, rx, outcome } = self;
        outcome.get_or_insert_with(|| {
            rx.recv().unwrap_or_else(|_| {
                Err(FsError::WorkerStopped {
                    path: path.clone(),
                })
            })
        })
    }

    /// Block, then report success or the failure that occurred.
    pub fn result(&mut self) -> Result<(), &FsError> {
        match self.wait() {
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Block, then borrow the buffer that was read (`None` on failure).
    pub fn buffer(&mut self) -> Option<&[u8]> {
        match self.wait() {
            Ok(completion) => Some(completion.buffer.as_slice()),
            Err(_) => None,
        }
    }

    /// Block, then return the number of bytes transferred (0 on failure).
    pub fn size(&mut self) -> usize {
        match self.wait() {
            Ok(completion) => completion.size,
            Err(_) => 0,
        }
    }

    /// Block, then take ownership of the outcome.
    pub fn into_outcome(mut self) -> FsOutcome {
        self.wait();
        self.outcome
            .take()
            .unwrap_or(Err(FsError::WorkerStopped { path: self.path }))
    }

    /// Block, then take ownership of the read buffer.
    pub fn into_buffer(self) -> Result<Vec<u8>, FsError> {
        self.into_outcome().map(|completion| completion.buffer)
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::file::{FileSystem, FsConfig};
    pub use crate::memory::MemoryFs;
    pub use crate::{Completion, FsError, FsOutcome, FsWork, Storage};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_work_is_done_immediately() {
        let mut work = FsWork::completed(
            "a",
            Ok(Completion {
                buffer: vec![7; 3],
                size: 3,
            }),
        );
        assert!(work.is_done());
        assert_eq!(work.size(), 3);
        assert_eq!(work.buffer(), Some(&[7u8, 7, 7][..]));
    }

    #[test]
    fn pending_work_resolves_when_sender_replies() {
        let (mut work, tx) = FsWork::pending("b");
        assert!(!work.is_done());
        tx.send(Ok(Completion::default())).unwrap();
        assert!(work.is_done());
        assert!(work.result().is_ok());
    }

    #[test]
    fn dropped_sender_reports_worker_stopped() {
        let (mut work, tx) = FsWork::pending("c");
        drop(tx);
        assert!(matches!(work.result(), Err(FsError::WorkerStopped { .. })));
        assert_eq!(work.size(), 0);
        assert!(work.buffer().is_none());
    }

    #[test]
    fn into_buffer_surfaces_error() {
        let work = FsWork::completed(
            "missing",
            Err(FsError::NotFound {
                path: "missing".to_owned(),
            }),
        );
        assert!(matches!(work.into_buffer(), Err(FsError::NotFound { .. })));
    }
}
