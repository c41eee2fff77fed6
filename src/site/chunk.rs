//! Fixed-size splitting of a blob into `<prefix>.<index>` files and the
//! matching rejoin.
//!
//! A chunk sequence carries no explicit length: it is `<prefix>.0`,
//! `<prefix>.1`, ... up to the first index whose file is missing.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub const MIN_CHUNK_BYTES: u64 = 1_024;
pub const MAX_CHUNK_BYTES: u64 = 1_048_576;
pub const DEFAULT_CHUNK_BYTES: u64 = 64_000;

const SPLIT_TAG: &str = "SPLIT_";
const JOIN_TAG: &str = "JOIN_";

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub prefix: PathBuf,
    pub chunks: u64,
    pub bytes: u64,
}

pub fn validate_chunk_size(max_chunk_bytes: u64) -> Result<()> {
    if !(MIN_CHUNK_BYTES..=MAX_CHUNK_BYTES).contains(&max_chunk_bytes) {
        return Err(PipelineError::InvalidConfiguration(format!(
            "chunk size {max_chunk_bytes} out of range {MIN_CHUNK_BYTES}..={MAX_CHUNK_BYTES}"
        ))
        .into());
    }
    Ok(())
}

pub fn chunk_path(prefix: &Path, index: u64) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Number of contiguous chunks present for `prefix`, starting at index 0.
pub fn probe_chunks(prefix: &Path) -> u64 {
    let mut count = 0;
    while chunk_path(prefix, count).is_file() {
        count += 1;
    }
    count
}

fn file_name_str(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))
}

/// `SPLIT_<name>` beside `blob`, with `-1`, `-2`, ... appended until neither
/// the prefix nor its first chunk exists yet.
pub fn split_prefix_for(blob: &Path) -> Result<PathBuf> {
    let dir = blob.parent().unwrap_or_else(|| Path::new(""));
    let base = format!("{SPLIT_TAG}{}", file_name_str(blob)?);
    let mut candidate = dir.join(&base);
    let mut attempt = 0u32;
    while candidate.exists() || chunk_path(&candidate, 0).exists() {
        attempt += 1;
        candidate = dir.join(format!("{base}-{attempt}"));
    }
    Ok(candidate)
}

/// `JOIN_<name>` beside the chunks, where `<name>` drops a leading `SPLIT_`.
pub fn join_path_for(prefix: &Path) -> Result<PathBuf> {
    let name = file_name_str(prefix)?;
    let stem = name.strip_prefix(SPLIT_TAG).unwrap_or(name);
    let dir = prefix.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(format!("{JOIN_TAG}{stem}")))
}

pub fn split(blob: &Path, max_chunk_bytes: u64) -> Result<SplitOutcome> {
    validate_chunk_size(max_chunk_bytes)?;
    let file = File::open(blob).map_err(|err| {
        PipelineError::InvalidInput(format!("cannot read {}: {err}", blob.display()))
    })?;
    let prefix = split_prefix_for(blob)?;

    let mut reader = BufReader::new(file);
    let mut buf = vec![0u8; max_chunk_bytes as usize];
    let mut chunks = 0u64;
    let mut bytes = 0u64;
    loop {
        let filled = read_full(&mut reader, &mut buf)
            .with_context(|| format!("failed to read {}", blob.display()))?;
        if filled == 0 {
            break;
        }
        let target = chunk_path(&prefix, chunks);
        fs::write(&target, &buf[..filled])
            .with_context(|| format!("failed to write {}", target.display()))?;
        chunks += 1;
        bytes += filled as u64;
        if filled < buf.len() {
            break;
        }
    }

    Ok(SplitOutcome {
        prefix,
        chunks,
        bytes,
    })
}

// `Read::read` may return short counts before EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

pub fn join(prefix: &Path) -> Result<PathBuf> {
    if !chunk_path(prefix, 0).is_file() {
        return Err(PipelineError::IncompleteSequence(prefix.display().to_string()).into());
    }
    let out = join_path_for(prefix)?;
    let mut writer = BufWriter::new(
        File::create(&out).with_context(|| format!("failed to create {}", out.display()))?,
    );

    let mut index = 0u64;
    loop {
        let part = chunk_path(prefix, index);
        let mut file = match File::open(&part) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => break,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open {}", part.display()));
            }
        };
        std::io::copy(&mut file, &mut writer)
            .with_context(|| format!("failed to append {}", part.display()))?;
        index += 1;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(out)
}
