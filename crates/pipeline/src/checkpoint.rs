//! FIFO queue of trained checkpoints awaiting evaluation.
//!
//! A checkpoint is a directory `checkpoints/checkpoint_<utc>`. It is written
//! into a staging area first and renamed into the queue once complete, so the
//! gate never sees a partial artifact.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::fsutil::{sorted_subdirs, unique_name};

#[derive(Debug, Clone)]
pub struct CheckpointQueue {
    queue: PathBuf,
    staging: PathBuf,
    archive: PathBuf,
}

impl CheckpointQueue {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let queue = Self {
            queue: root.join("checkpoints"),
            staging: root.join("checkpoints_staging"),
            archive: root.join("checkpoints_archive"),
        };
        for dir in [&queue.queue, &queue.staging, &queue.archive] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(queue)
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive
    }

    /// Publish a new checkpoint whose contents are produced by `write`
    pub fn publish<F>(&self, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let name = unique_name(&[&self.queue, &self.staging, &self.archive], "checkpoint");
        let staged = self.staging.join(&name);
        fs::create_dir_all(&staged).with_context(|| format!("creating {}", staged.display()))?;

        if let Err(e) = write(&staged) {
            // Partial output is left in staging only
            let _ = fs::remove_dir_all(&staged);
            return Err(e.context(format!("writing checkpoint {name}")));
        }

        let published = self.queue.join(&name);
        fs::rename(&staged, &published).with_context(|| format!("publishing {name}"))?;
        info!("[trainer] published {name}");
        Ok(published)
    }

    /// Waiting checkpoints, oldest first
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        sorted_subdirs(&self.queue)
    }

    pub fn oldest(&self) -> Result<Option<PathBuf>> {
        Ok(self.pending()?.into_iter().next())
    }

    /// Move an evaluated checkpoint out of the queue
    pub fn archive(&self, checkpoint: &Path) -> Result<PathBuf> {
        let name = checkpoint
            .file_name()
            .with_context(|| format!("{} has no file name", checkpoint.display()))?;
        let mut target = self.archive.join(name);
        if target.exists() {
            let name = name.to_string_lossy();
            target = self.archive.join(unique_name(&[&self.archive], &name));
        }
        fs::rename(checkpoint, &target).with_context(|| format!("archiving {}", checkpoint.display()))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn write_marker(tag: &'static str) -> impl FnOnce(&Path) -> Result<()> {
        move |dir| {
            fs::write(dir.join("model.json"), tag)?;
            Ok(())
        }
    }

    #[test]
    fn test_publish_is_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CheckpointQueue::open(dir.path()).unwrap();

        let first = queue.publish(write_marker("a")).unwrap();
        let second = queue.publish(write_marker("b")).unwrap();

        assert_ne!(first, second);
        assert_eq!(queue.pending().unwrap(), vec![first.clone(), second]);
        assert_eq!(queue.oldest().unwrap(), Some(first.clone()));
        assert_eq!(fs::read_to_string(first.join("model.json")).unwrap(), "a");
        assert!(first.file_name().unwrap().to_str().unwrap().starts_with("checkpoint_"));
    }

    #[test]
    fn test_failed_write_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CheckpointQueue::open(dir.path()).unwrap();

        let result = queue.publish(|_| Err(anyhow!("disk full")));

        assert!(result.is_err());
        assert!(queue.pending().unwrap().is_empty());
    }

    #[test]
    fn test_archive_removes_from_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CheckpointQueue::open(dir.path()).unwrap();
        let ckpt = queue.publish(write_marker("a")).unwrap();

        let archived = queue.archive(&ckpt).unwrap();

        assert!(archived.starts_with(queue.archive_dir()));
        assert!(archived.join("model.json").exists());
        assert_eq!(queue.oldest().unwrap(), None);
    }
}
