use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::model::Dataset;
use crate::parsers::{self, LoadError, LogPaths};

type LoadResult = Result<Arc<Dataset>, LoadError>;

/// A directory being parsed on a worker thread.
///
/// The directory is validated before the thread starts, so a bad path is
/// reported by [`spawn_load`] itself. Whatever is currently displayed
/// stays untouched until the finished dataset is taken and installed.
pub struct PendingLoad {
    dir: PathBuf,
    receiver: Receiver<LoadResult>,
}

/// Validate `dir` and start parsing it in the background.
pub fn spawn_load(dir: &Path) -> Result<PendingLoad, LoadError> {
    LogPaths::in_dir(dir)?;
    let (sender, receiver) = mpsc::channel();
    let worker_dir = dir.to_path_buf();
    thread::Builder::new()
        .name("heapvis-loader".into())
        .spawn(move || {
            let result = parsers::load_dir(&worker_dir).map(Arc::new);
            if let Err(err) = &result {
                tracing::warn!(dir = %worker_dir.display(), error = %err, "load failed");
            }
            // receiver gone means the load was abandoned
            let _ = sender.send(result);
        })
        .map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    Ok(PendingLoad {
        dir: dir.to_path_buf(),
        receiver,
    })
}

impl PendingLoad {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Non-blocking poll. `None` while the worker is still running.
    pub fn try_take(&self) -> Option<LoadResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.interrupted())),
        }
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> LoadResult {
        self.receiver.recv().unwrap_or_else(|_| Err(self.interrupted()))
    }

    fn interrupted(&self) -> LoadError {
        LoadError::Interrupted {
            path: self.dir.clone(),
        }
    }
}
