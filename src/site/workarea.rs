use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

const EXTRACT_DIR: &str = "DTAR";

/// Scratch directory holding every intermediate artifact of one run.
#[derive(Debug, Clone)]
pub struct WorkingArea {
    root: PathBuf,
}

/// Exclusive hold on a working area; released on drop.
#[derive(Debug)]
pub struct WorkAreaLock {
    file: File,
}

impl Drop for WorkAreaLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl WorkingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))
    }

    /// Wipe and recreate the area so no stale chunk file survives into a run.
    pub fn reset(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("failed to clear {}", self.root.display()));
            }
        }
        self.ensure()
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.root.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the area for one workflow. The lock file sits beside the area
    /// so `reset` never removes it.
    pub fn lock(&self) -> Result<WorkAreaLock> {
        let path = self.lock_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(PipelineError::InvalidInput(format!(
                "working area {} is locked by another run",
                self.root.display()
            ))
            .into());
        }
        Ok(WorkAreaLock { file })
    }

    /// Whether `path` sits inside the area, where `reset` would delete it.
    /// An area that does not exist yet holds nothing.
    pub fn contains(&self, path: &Path) -> bool {
        let (Ok(root), Ok(path)) = (self.root.canonicalize(), path.canonicalize()) else {
            return false;
        };
        path.starts_with(root)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn meta_path(&self, record: &str) -> PathBuf {
        self.path(&format!("{record}.meta"))
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.path(EXTRACT_DIR)
    }

    /// Prefix that fetched nodes are written under before rejoining.
    pub fn download_prefix(&self, record: &str) -> PathBuf {
        self.path(&format!("SPLIT_{record}.br"))
    }
}
