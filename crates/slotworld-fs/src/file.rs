//! Threaded file backend.
//!
//! [`FileSystem`] owns one worker thread and a bounded request queue. Each
//! [`Storage`] call enqueues a request and hands back an [`FsWork`] that the
//! worker resolves once the file operation finishes. Submitting blocks only
//! when the queue is full.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Completion, FsError, FsOutcome, FsWork, Storage};

// ---------------------------------------------------------------------------
// FsConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`FileSystem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Directory every request path is resolved against.
    pub root: PathBuf,
    /// Maximum number of requests waiting for the worker.
    pub queue_capacity: usize,
}

impl Default for FsConfig {
    /// Current directory, 16 queued requests.
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            queue_capacity: 16,
        }
    }
}

impl FsConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, FsError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

enum Request {
    Read {
        path: String,
        full_path: PathBuf,
        reply: Sender<FsOutcome>,
    },
    Write {
        path: String,
        full_path: PathBuf,
        bytes: Vec<u8>,
        reply: Sender<FsOutcome>,
    },
}

// ---------------------------------------------------------------------------
// FileSystem
// ---------------------------------------------------------------------------

/// File-backed [`Storage`] with a dedicated I/O worker thread.
///
/// Dropping the `FileSystem` closes the queue, lets the worker drain any
/// requests already submitted, and joins it.
#[derive(Debug)]
pub struct FileSystem {
    root: PathBuf,
    queue: Option<SyncSender<Request>>,
    worker: Option<JoinHandle<()>>,
}

impl FileSystem {
    /// Start the worker thread.
    pub fn new(config: FsConfig) -> Result<Self, FsError> {
        let (queue, requests) = mpsc::sync_channel(config.queue_capacity.max(1));
        let worker = thread::Builder::new()
            .name("slotworld-fs".to_owned())
            .spawn(move || worker_loop(requests))
            .map_err(FsError::Spawn)?;
        debug!(root = %config.root.display(), queue_capacity = config.queue_capacity, "file system started");
        Ok(Self {
            root: config.root,
            queue: Some(queue),
            worker: Some(worker),
        })
    }

    /// Directory requests are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn submit(&self, path: &str, make: impl FnOnce(PathBuf, Sender<FsOutcome>) -> Request) -> FsWork {
        if !is_contained(Path::new(path)) {
            warn!(path, root = %self.root.display(), "rejecting path outside storage root");
            return FsWork::completed(
                path,
                Err(FsError::InvalidPath {
                    path: path.to_owned(),
                }),
            );
        }
        let (work, reply) = FsWork::pending(path);
        let request = make(self.root.join(path), reply);
        match &self.queue {
            // A failed send drops the request and its reply sender, which
            // resolves the work as `WorkerStopped`.
            Some(queue) => {
                if queue.send(request).is_err() {
                    warn!(path, "storage worker is gone, request dropped");
                }
            }
            None => drop(request),
        }
        work
    }
}

impl Storage for FileSystem {
    fn read(&self, path: &str) -> FsWork {
        self.submit(path, |full_path, reply| Request::Read {
            path: path.to_owned(),
            full_path,
            reply,
        })
    }

    fn write(&self, path: &str, bytes: Vec<u8>) -> FsWork {
        self.submit(path, |full_path, reply| Request::Write {
            path: path.to_owned(),
            full_path,
            bytes,
            reply,
        })
    }
}

impl Drop for FileSystem {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("storage worker panicked during shutdown");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn worker_loop(requests: Receiver<Request>) {
    while let Ok(request) = requests.recv() {
        let (reply, outcome) = match request {
            Request::Read {
                path,
                full_path,
                reply,
            } => (reply, read_file(path, &full_path)),
            Request::Write {
                path,
                full_path,
                bytes,
                reply,
            } => (reply, write_file(path, &full_path, &bytes)),
        };
        // The caller may have dropped its handle; nothing to report then.
        let _ = reply.send(outcome);
    }
    debug!("storage worker exiting");
}

/// True when `path` names something strictly below the root: relative,
/// with no `..` and at least one normal component.
fn is_contained(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    named
}

fn read_file(path: String, full_path: &Path) -> FsOutcome {
    match std::fs::read(full_path) {
        Ok(buffer) => {
            let size = buffer.len();
            Ok(Completion { buffer, size })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FsError::NotFound { path }),
        Err(source) => Err(FsError::Io { path, source }),
    }
}

fn write_file(path: String, full_path: &Path, bytes: &[u8]) -> FsOutcome {
    match std::fs::write(full_path, bytes) {
        Ok(()) => Ok(Completion {
            buffer: Vec::new(),
            size: bytes.len(),
        }),
        Err(source) => Err(FsError::Io { path, source }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "slotworld-fs-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn file_system(name: &str) -> FileSystem {
        FileSystem::new(FsConfig {
            root: scratch_dir(name),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn write_then_read_roundtrip() {
        let fs = file_system("roundtrip");
        let mut write = fs.write("data.bin", vec![1, 2, 3, 4]);
        assert!(write.result().is_ok());
        assert_eq!(write.size(), 4);

        let mut read = fs.read("data.bin");
        assert_eq!(read.buffer(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(read.size(), 4);
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let fs = file_system("missing");
        let mut read = fs.read("does-not-exist");
        assert!(matches!(read.result(), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let fs = file_system("escape");
        let outside = std::env::temp_dir().join(format!(
            "slotworld-fs-{}-outside.bin",
            std::process::id()
        ));
        let outside = outside.to_str().unwrap();

        let mut write = fs.write(outside, vec![1, 2, 3]);
        assert!(matches!(write.result(), Err(FsError::InvalidPath { .. })));
        assert_eq!(write.size(), 0);
        assert!(!Path::new(outside).exists());

        let mut write = fs.write("../escaped.bin", vec![1]);
        assert!(matches!(write.result(), Err(FsError::InvalidPath { .. })));
        assert!(!fs.root().join("../escaped.bin").exists());

        let mut read = fs.read("nested/../../escaped.bin");
        assert!(matches!(read.result(), Err(FsError::InvalidPath { .. })));
        let mut read = fs.read("");
        assert!(matches!(read.result(), Err(FsError::InvalidPath { .. })));

        // Paths that stay below the root still work.
        assert!(fs.write("./inside.bin", vec![4]).result().is_ok());
        assert_eq!(fs.read("inside.bin").into_buffer().unwrap(), vec![4]);
    }

    #[test]
    fn write_into_missing_directory_is_io_error() {
        let fs = file_system("nodir");
        let mut write = fs.write("no/such/dir/file", vec![0]);
        assert!(matches!(write.result(), Err(FsError::Io { .. })));
    }

    #[test]
    fn requests_complete_in_submission_order() {
        let fs = file_system("ordering");
        let works: Vec<FsWork> = (0..8u8)
            .map(|i| fs.write("same.bin", vec![i; 16]))
            .collect();
        for mut work in works {
            assert!(work.result().is_ok());
        }
        let data = fs.read("same.bin").into_buffer().unwrap();
        assert_eq!(data, vec![7u8; 16]);
    }

    #[test]
    fn drop_drains_submitted_requests() {
        let dir = scratch_dir("drain");
        let mut work = {
            let fs = FileSystem::new(FsConfig {
                root: dir.clone(),
                queue_capacity: 2,
            })
            .unwrap();
            fs.write("late.bin", vec![9; 8])
        };
        assert!(work.result().is_ok());
        assert_eq!(std::fs::read(dir.join("late.bin")).unwrap(), vec![9u8; 8]);
    }

    #[test]
    fn config_from_json_uses_defaults_for_missing_fields() {
        let config = FsConfig::from_json(r#"{ "root": "saves" }"#).unwrap();
        assert_eq!(config.root, PathBuf::from("saves"));
        assert_eq!(config.queue_capacity, 16);
        assert!(FsConfig::from_json("not json").is_err());
    }
}
