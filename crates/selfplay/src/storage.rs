//! Directory-backed replay queue.
//!
//! Finished games land in `pending/` as one JSON file each. A consumer claims
//! a file by renaming it into `processing/` (only one rename can succeed) and
//! archives it into `archive/` once done. Files are never deleted.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use thiserror::Error;

use crate::data::EpisodeSample;

const UNIT_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

static UNIT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed replay unit {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the file itself is bad, as opposed to the filesystem failing
    pub fn is_malformed(&self) -> bool {
        matches!(self, StorageError::Json { .. } | StorageError::Malformed { .. })
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// The samples of one finished game, tagged with the worker that played it
#[derive(Debug, Clone)]
pub struct ReplayUnit {
    pub worker_id: usize,
    pub samples: Vec<EpisodeSample>,
}

impl ReplayUnit {
    pub fn new(worker_id: usize, samples: Vec<EpisodeSample>) -> Self {
        Self { worker_id, samples }
    }
}

/// Replay queue rooted at a directory
#[derive(Debug, Clone)]
pub struct ReplayStore {
    pending: PathBuf,
    processing: PathBuf,
    archive: PathBuf,
}

impl ReplayStore {
    /// Open (and create if needed) the queue directories under `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let store = Self {
            pending: root.join("pending"),
            processing: root.join("processing"),
            archive: root.join("archive"),
        };
        for dir in [&store.pending, &store.processing, &store.archive] {
            fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        }
        Ok(store)
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending
    }

    pub fn processing_dir(&self) -> &Path {
        &self.processing
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive
    }

    /// Durably write one unit into `pending/` under a fresh name.
    ///
    /// The file appears under its final name only once fully written.
    pub fn write_unit(&self, unit: &ReplayUnit) -> Result<PathBuf> {
        let seq = UNIT_SEQ.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        let name = format!("game_{}_{}_{}", unit.worker_id, millis, seq);
        let final_path = self.pending.join(&name).with_extension(UNIT_EXTENSION);
        let temp_path = self.pending.join(&name).with_extension(TEMP_EXTENSION);

        let json = serde_json::to_vec(&unit.samples).map_err(|e| StorageError::Json {
            path: final_path.clone(),
            source: e,
        })?;

        write_synced(&temp_path, &json)?;
        fs::rename(&temp_path, &final_path).map_err(|e| StorageError::io(&final_path, e))?;
        Ok(final_path)
    }

    /// Units waiting in `pending/`, oldest name first
    pub fn pending_units(&self) -> Result<Vec<PathBuf>> {
        list_units(&self.pending)
    }

    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.pending_units()?.len())
    }

    /// Move a pending unit into `processing/`.
    ///
    /// Fails with `NotFound` when another consumer claimed it first.
    pub fn claim(&self, pending: &Path) -> Result<PathBuf> {
        let target = self.processing.join(file_name(pending)?);
        fs::rename(pending, &target).map_err(|e| StorageError::io(pending, e))?;
        Ok(target)
    }

    /// Claim every pending unit, skipping the ones other consumers won
    pub fn claim_all(&self) -> Result<Vec<PathBuf>> {
        let mut claimed = Vec::new();
        for path in self.pending_units()? {
            match self.claim(&path) {
                Ok(p) => claimed.push(p),
                Err(StorageError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(claimed)
    }

    /// Move a claimed unit into `archive/`
    pub fn archive(&self, claimed: &Path) -> Result<PathBuf> {
        let target = self.archive.join(file_name(claimed)?);
        fs::rename(claimed, &target).map_err(|e| StorageError::io(claimed, e))?;
        Ok(target)
    }

    /// Give a claimed unit back to `pending/` without consuming it
    pub fn release(&self, claimed: &Path) -> Result<PathBuf> {
        let target = self.pending.join(file_name(claimed)?);
        fs::rename(claimed, &target).map_err(|e| StorageError::io(claimed, e))?;
        Ok(target)
    }

    /// Return units left in `processing/` by an interrupted consumer to the queue
    pub fn recover_processing(&self) -> Result<usize> {
        let stranded = list_units(&self.processing)?;
        for path in &stranded {
            self.release(path)?;
        }
        if !stranded.is_empty() {
            warn!("returned {} stranded replay units to the queue", stranded.len());
        }
        Ok(stranded.len())
    }
}

/// Read and validate a replay unit file
pub fn load_unit(path: &Path) -> Result<Vec<EpisodeSample>> {
    let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
    let samples: Vec<EpisodeSample> = serde_json::from_slice(&bytes).map_err(|e| StorageError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let malformed = |reason: String| StorageError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let Some(first) = samples.first() else {
        return Err(malformed("no samples".into()));
    };
    let size = first.board.size();
    for (i, sample) in samples.iter().enumerate() {
        if sample.board.size() != size {
            return Err(malformed(format!(
                "sample {i} has board side {}, expected {size}",
                sample.board.size()
            )));
        }
        if sample.policy.len() != size * size {
            return Err(malformed(format!(
                "sample {i} has {} policy entries, expected {}",
                sample.policy.len(),
                size * size
            )));
        }
        if !(-1.0..=1.0).contains(&sample.value) {
            return Err(malformed(format!("sample {i} has value {}", sample.value)));
        }
    }

    Ok(samples)
}

/// Like [`load_unit`], but also rejects units played on another board size
pub fn load_unit_for_board(path: &Path, board_size: usize) -> Result<Vec<EpisodeSample>> {
    let samples = load_unit(path)?;
    let size = samples.first().map_or(board_size, |s| s.board.size());
    if size != board_size {
        return Err(StorageError::Malformed {
            path: path.to_path_buf(),
            reason: format!("board side {size}, expected {board_size}"),
        });
    }
    Ok(samples)
}

fn list_units(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
    let mut units = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StorageError::io(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == UNIT_EXTENSION) {
            units.push(path);
        }
    }
    units.sort();
    Ok(units)
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| {
        StorageError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })
}

/// Write `bytes` to `path` and flush them to disk
pub(crate) fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| StorageError::io(path, e))?;
    file.write_all(bytes).map_err(|e| StorageError::io(path, e))?;
    file.sync_all().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}
