use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PipelineError;

/// Archive name used when the source's own name cannot name a file.
pub const PLACEHOLDER_NAME: &str = "website";

/// Base name for artifacts derived from `source`, e.g. `site` for `/srv/site/`.
pub fn archive_base_name(source: &Path) -> String {
    source
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(PLACEHOLDER_NAME)
        .to_string()
}

/// Pack `source` into `<out_dir>/<name>.tar`.
///
/// A directory contributes its contents with paths relative to itself; the
/// directory's own name never appears in the archive. A single file is stored
/// under its base name only.
pub fn pack(source: &Path, out_dir: &Path) -> Result<PathBuf> {
    if !source.exists() {
        return Err(anyhow::Error::new(PipelineError::InvalidInput(format!(
            "pack source {} does not exist",
            source.display()
        ))));
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let archive_path = out_dir.join(format!("{}.tar", archive_base_name(source)));
    let file = File::create(&archive_path)
        .with_context(|| format!("failed to create {}", archive_path.display()))?;
    let mut builder = tar::Builder::new(file);

    if source.is_dir() {
        for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", source.display()))?;
            let path = entry.path();
            if path == archive_path {
                continue;
            }
            let rel = path
                .strip_prefix(source)
                .with_context(|| format!("{} escapes {}", path.display(), source.display()))?;
            if entry.file_type().is_dir() {
                builder
                    .append_dir(rel, path)
                    .with_context(|| format!("failed to archive {}", path.display()))?;
            } else {
                builder
                    .append_path_with_name(path, rel)
                    .with_context(|| format!("failed to archive {}", path.display()))?;
            }
        }
    } else {
        let name = source
            .file_name()
            .context("pack source has no file name")?;
        builder
            .append_path_with_name(source, name)
            .with_context(|| format!("failed to archive {}", source.display()))?;
    }

    builder
        .finish()
        .with_context(|| format!("failed to finish {}", archive_path.display()))?;
    Ok(archive_path)
}

/// Extract every member of `archive` under `target_dir`.
pub fn unpack(archive: &Path, target_dir: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|err| {
        PipelineError::CorruptArchive(format!("cannot open {}: {err}", archive.display()))
    })?;
    fs::create_dir_all(target_dir)
        .with_context(|| format!("failed to create {}", target_dir.display()))?;
    tar::Archive::new(file).unpack(target_dir).map_err(|err| {
        PipelineError::CorruptArchive(format!("cannot extract {}: {err}", archive.display()))
    })?;
    Ok(())
}
