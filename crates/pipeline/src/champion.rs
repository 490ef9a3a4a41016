//! The single current champion artifact.
//!
//! Layout under the data root:
//! - `champion/versions/<id>/`: immutable artifact directories
//! - `champion/CURRENT`: the id of the current version, replaced by rename
//! - `champion_archive/champion_<utc>/`: copies of every replaced champion
//!
//! Readers resolve `CURRENT` once and then read a version directory that is
//! never modified afterwards, so a concurrent promotion cannot tear a load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

use crate::fsutil::{copy_dir, unique_name, write_atomic};

const POINTER: &str = "CURRENT";

#[derive(Debug, Clone)]
pub struct ChampionStore {
    root: PathBuf,
    versions: PathBuf,
    archive: PathBuf,
}

impl ChampionStore {
    pub fn open<P: AsRef<Path>>(data_root: P) -> Result<Self> {
        let data_root = data_root.as_ref();
        let root = data_root.join("champion");
        let store = Self {
            versions: root.join("versions"),
            archive: data_root.join("champion_archive"),
            root,
        };
        for dir in [&store.versions, &store.archive] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(store)
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive
    }

    pub fn current_id(&self) -> Result<Option<String>> {
        let pointer = self.root.join(POINTER);
        match fs::read_to_string(&pointer) {
            Ok(id) => {
                let id = id.trim();
                if id.is_empty() {
                    bail!("{} is empty", pointer.display());
                }
                Ok(Some(id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", pointer.display())),
        }
    }

    /// Directory of the current champion, or `None` before the first promotion
    pub fn current_dir(&self) -> Result<Option<PathBuf>> {
        let Some(id) = self.current_id()? else {
            return Ok(None);
        };
        let dir = self.versions.join(&id);
        if !dir.is_dir() {
            bail!("champion pointer names missing version {id}");
        }
        Ok(Some(dir))
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.current_id()?.is_some())
    }

    /// Make a copy of `artifact` the new champion.
    ///
    /// The previous champion is archived first. Any failure before the pointer
    /// swap leaves the previous champion current.
    pub fn install(&self, artifact: &Path) -> Result<PathBuf> {
        if let Some(previous) = self.current_dir()? {
            let name = unique_name(&[&self.archive], "champion");
            copy_dir(&previous, &self.archive.join(&name))
                .with_context(|| format!("archiving previous champion as {name}"))?;
            info!("[gate] archived previous champion as {name}");
        }

        let id = unique_name(&[&self.versions], "champion");
        let staged = self.versions.join(format!(".staging_{id}"));
        if let Err(e) = copy_dir(artifact, &staged) {
            let _ = fs::remove_dir_all(&staged);
            return Err(e.context(format!("staging {}", artifact.display())));
        }
        let version = self.versions.join(&id);
        fs::rename(&staged, &version).with_context(|| format!("installing version {id}"))?;

        write_atomic(&self.root.join(POINTER), id.as_bytes()).context("swapping champion pointer")?;
        info!("[gate] champion is now {id}");
        Ok(version)
    }
}
