pub mod callstack;
pub mod lines;
pub mod snapshot;
pub mod staleness;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::{Callstack, Dataset, Snapshot};

pub use callstack::CallstackLogError;
pub use lines::FieldError;
pub use snapshot::SnapshotLogError;
pub use staleness::StalenessLogError;

pub const CALLSTACK_LOG: &str = "callstack.log";
pub const SNAPSHOT_LOG: &str = "snapshot.log";
pub const STALENESS_LOG: &str = "staleness.log";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("callstack.log: {0}")]
    Callstack(#[from] CallstackLogError),
    #[error("snapshot.log: {0}")]
    Snapshot(#[from] SnapshotLogError),
    #[error("staleness.log: {0}")]
    Staleness(#[from] StalenessLogError),
    #[error("staleness.log has {blocks} snapshot blocks but snapshot.log has {snapshots}")]
    UnknownSnapshot { blocks: usize, snapshots: usize },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid directory: {path}")]
    InvalidDirectory { path: PathBuf },
    #[error("missing or unreadable log file: {path}")]
    InvalidFile { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed logs: {0}")]
    Malformed(#[from] ParseError),
    #[error("loading {path} was interrupted")]
    Interrupted { path: PathBuf },
}

/// Parse the three log streams into a cross-referenced [`Dataset`].
///
/// The callstack log is read first, since the other two refer to its
/// ordinals. Nothing is returned unless all three parse cleanly.
pub fn parse_logs(
    callstack_log: &[u8],
    snapshot_log: &[u8],
    staleness_log: &[u8],
) -> Result<Dataset, ParseError> {
    let mut callstacks = callstack::parse_callstack_log(callstack_log)?;
    let snapshot::SnapshotLog {
        snapshots,
        time_unit,
    } = snapshot::parse_snapshot_log(snapshot_log, &mut callstacks)?;
    let blocks = staleness::parse_staleness_log(staleness_log, &mut callstacks)?;
    if blocks > snapshots.len() {
        return Err(ParseError::UnknownSnapshot {
            blocks,
            snapshots: snapshots.len(),
        });
    }
    warn_orphan_staleness(&callstacks, &snapshots);
    Ok(Dataset::new(callstacks, snapshots, time_unit))
}

/// Staleness samples are only drawn for callstacks a snapshot associates;
/// anything else is kept but reported.
fn warn_orphan_staleness(callstacks: &[Callstack], snapshots: &[Snapshot]) {
    for callstack in callstacks {
        for &snapshot in callstack.staleness.keys() {
            let associated = snapshots
                .get(snapshot)
                .is_some_and(|snap| snap.assoc_callstacks.contains(&callstack.id));
            if !associated {
                tracing::warn!(
                    callstack = callstack.id,
                    snapshot,
                    "staleness sample for a callstack with no allocations in that snapshot"
                );
            }
        }
    }
}

/// Locations of the three logs inside a results directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub callstack: PathBuf,
    pub snapshot: PathBuf,
    pub staleness: PathBuf,
}

impl LogPaths {
    /// Check that `dir` is a readable directory holding all three logs.
    pub fn in_dir(dir: &Path) -> Result<Self, LoadError> {
        if !dir.is_dir() || fs::read_dir(dir).is_err() {
            return Err(LoadError::InvalidDirectory {
                path: dir.to_path_buf(),
            });
        }
        let file = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(LoadError::InvalidFile { path })
            }
        };
        Ok(Self {
            callstack: file(CALLSTACK_LOG)?,
            snapshot: file(SNAPSHOT_LOG)?,
            staleness: file(STALENESS_LOG)?,
        })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate `dir` and parse the logs it contains.
pub fn load_dir(dir: &Path) -> Result<Dataset, LoadError> {
    let paths = LogPaths::in_dir(dir)?;
    tracing::info!(dir = %dir.display(), "loading heap profile logs");
    let dataset = parse_logs(
        &read(&paths.callstack)?,
        &read(&paths.snapshot)?,
        &read(&paths.staleness)?,
    )?;
    tracing::info!(
        callstacks = dataset.callstacks().len(),
        snapshots = dataset.snapshots().len(),
        unit = dataset.time_unit(),
        "logs loaded"
    );
    Ok(dataset)
}
