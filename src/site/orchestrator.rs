//! Upload and download workflows over the local codecs and the record client.
//!
//! Every step runs to completion before the next starts and any failure ends
//! the workflow. Nothing is rolled back: nodes appended before a failure stay
//! on the record, and the working area keeps the last artifacts written.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::ledger::client::RecordService;
use crate::ledger::types::validate_record_name;
use crate::site::session::Session;
use crate::site::warn::{self, WarnEvent};
use crate::site::{archive, chunk, compress, util};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    MetadataChecked,
    Creating,
    Verified,
    Packing,
    Compressing,
    Splitting,
    Uploading(u64),
    Published,
    Fetching(u64),
    Joining,
    Decompressing,
    Unpacking,
    Copied,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("idle"),
            Stage::MetadataChecked => f.write_str("metadata-checked"),
            Stage::Creating => f.write_str("creating"),
            Stage::Verified => f.write_str("verified"),
            Stage::Packing => f.write_str("packing"),
            Stage::Compressing => f.write_str("compressing"),
            Stage::Splitting => f.write_str("splitting"),
            Stage::Uploading(i) => write!(f, "uploading[{i}]"),
            Stage::Published => f.write_str("published"),
            Stage::Fetching(i) => write!(f, "fetching[{i}]"),
            Stage::Joining => f.write_str("joining"),
            Stage::Decompressing => f.write_str("decompressing"),
            Stage::Unpacking => f.write_str("unpacking"),
            Stage::Copied => f.write_str("copied"),
        }
    }
}

#[derive(Debug)]
struct Run<'a> {
    phase: &'static str,
    record: &'a str,
    stage: Stage,
}

impl<'a> Run<'a> {
    fn new(phase: &'static str, record: &'a str) -> Self {
        Self {
            phase,
            record,
            stage: Stage::Idle,
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::info!(phase = self.phase, record = self.record, %stage, "entering stage");
        self.stage = stage;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub record: String,
    pub owner: String,
    pub created: bool,
    pub nodes: u64,
    pub payload_bytes: u64,
    pub payload_sha256: String,
    pub archive_path: PathBuf,
    #[serde(skip)]
    pub warnings: Vec<PipelineError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub record: String,
    pub owner: String,
    pub nodes: u64,
    pub payload_sha256: String,
    pub files_copied: u64,
    pub output_dir: PathBuf,
}

fn finish<T>(session: &Session, run: &Run<'_>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session.audit(run.phase, "ok", &format!("record={} stage={}", run.record, run.stage));
            Ok(value)
        }
        Err(err) => {
            let detail = format!("{err:#}");
            tracing::error!(
                phase = run.phase,
                record = run.record,
                stage = %run.stage,
                artifact = ?session.selection.current(),
                error = %detail,
                "workflow stopped"
            );
            session.audit(
                run.phase,
                "failed",
                &format!("record={} stage={} error={detail}", run.record, run.stage),
            );
            Err(err.context(format!(
                "{} of `{}` stopped at stage {}",
                run.phase, run.record, run.stage
            )))
        }
    }
}

/// Pack `input`, compress it, split it and append each chunk as a node of
/// `record`, then publish the record.
///
/// Refuses a record that already holds nodes. A record owned by another
/// account is only warned about.
pub fn website_upload(
    session: &mut Session,
    service: &dyn RecordService,
    record: &str,
    input: &Path,
) -> Result<UploadOutcome> {
    let mut run = Run::new("upload", record);
    let _lock = session.area.lock()?;
    session.audit("upload", "start", &format!("record={record} input={}", input.display()));
    let result = upload_steps(session, service, record, input, &mut run);
    finish(session, &run, result)
}

fn upload_steps(
    session: &mut Session,
    service: &dyn RecordService,
    record: &str,
    input: &Path,
    run: &mut Run<'_>,
) -> Result<UploadOutcome> {
    if !input.exists() {
        return Err(PipelineError::InvalidInput(format!(
            "upload input {} does not exist",
            input.display()
        ))
        .into());
    }
    if session.area.contains(input) {
        return Err(PipelineError::InvalidInput(format!(
            "upload input {} lies inside working area {}",
            input.display(),
            session.area.root().display()
        ))
        .into());
    }
    validate_record_name(record)?;
    let owner = session.require_account()?.actor.clone();
    let chunk_size = session.config.transfer.chunk_size;
    chunk::validate_chunk_size(chunk_size)?;

    session.area.reset()?;
    session.selection.clear();

    let meta = session.fetch_metadata(service, &owner, record)?;
    run.enter(Stage::MetadataChecked);

    let mut warnings = Vec::new();
    let created = match meta {
        Some(meta) => {
            if !meta.is_empty() {
                return Err(PipelineError::RecordNotEmpty {
                    record: record.to_string(),
                    top: meta.top,
                }
                .into());
            }
            if meta.owner != owner {
                let mismatch = PipelineError::OwnerMismatch {
                    record: record.to_string(),
                    owner: meta.owner.clone(),
                    account: owner.clone(),
                };
                let reason = mismatch.to_string();
                tracing::warn!(record, owner = %meta.owner, account = %owner, "owner mismatch");
                warn::emit(WarnEvent {
                    code: mismatch.code(),
                    stage: "metadata",
                    record,
                    account: &owner,
                    reason: &reason,
                });
                session.audit("upload", "warn", &reason);
                warnings.push(mismatch);
            }
            run.enter(Stage::Verified);
            false
        }
        None => {
            run.enter(Stage::Creating);
            service.create_record(&owner, record)?;
            true
        }
    };

    run.enter(Stage::Packing);
    let archive_path = archive::pack(input, session.area.root())?;
    session.selection.select(archive_path.clone());

    run.enter(Stage::Compressing);
    let current = session.selection.require_existing()?.to_path_buf();
    let compressed = compress::compress(&current, session.config.transfer.brotli_quality)?;
    session.selection.select(compressed);

    let current = session.selection.require_existing()?.to_path_buf();
    let payload_bytes = fs::metadata(&current)
        .with_context(|| format!("failed to stat {}", current.display()))?
        .len();
    let payload_sha256 = util::file_sha256(&current)?;

    run.enter(Stage::Splitting);
    let split = chunk::split(&current, chunk_size)?;
    tracing::info!(record, chunks = split.chunks, bytes = split.bytes, "payload split");
    session.selection.select_prefix(split.prefix);

    // The record was empty, so the next node index is the number appended so far.
    let prefix = session.selection.require_prefix()?.to_path_buf();
    let mut index = 0u64;
    loop {
        let part = chunk::chunk_path(&prefix, index);
        if !part.is_file() {
            break;
        }
        run.enter(Stage::Uploading(index));
        let payload =
            fs::read(&part).with_context(|| format!("failed to read {}", part.display()))?;
        service.append_node(&owner, record, index, &payload)?;
        index += 1;
    }

    service.set_published(&owner, record, true)?;
    run.enter(Stage::Published);

    Ok(UploadOutcome {
        record: record.to_string(),
        owner,
        created,
        nodes: index,
        payload_bytes,
        payload_sha256,
        archive_path,
        warnings,
    })
}

/// Fetch every node of `record`, rebuild the archive and copy its contents
/// into `output_dir`.
pub fn website_download(
    session: &mut Session,
    service: &dyn RecordService,
    record: &str,
    output_dir: &Path,
) -> Result<DownloadOutcome> {
    let mut run = Run::new("download", record);
    let _lock = session.area.lock()?;
    session.audit(
        "download",
        "start",
        &format!("record={record} output={}", output_dir.display()),
    );
    let result = download_steps(session, service, record, output_dir, &mut run);
    finish(session, &run, result)
}

fn download_steps(
    session: &mut Session,
    service: &dyn RecordService,
    record: &str,
    output_dir: &Path,
    run: &mut Run<'_>,
) -> Result<DownloadOutcome> {
    validate_record_name(record)?;
    let owner = session.require_account()?.actor.clone();
    fs::create_dir_all(output_dir).map_err(|err| {
        PipelineError::InvalidInput(format!(
            "cannot create output {}: {err}",
            output_dir.display()
        ))
    })?;
    if session.area.contains(output_dir) {
        return Err(PipelineError::InvalidInput(format!(
            "download output {} lies inside working area {}",
            output_dir.display(),
            session.area.root().display()
        ))
        .into());
    }

    session.area.reset()?;
    session.selection.clear();

    let Some(meta) = session.fetch_metadata(service, &owner, record)? else {
        return Err(PipelineError::RecordNotFound(record.to_string()).into());
    };
    run.enter(Stage::MetadataChecked);
    run.enter(Stage::Verified);

    let prefix = session.area.download_prefix(record);
    session.selection.select_prefix(prefix.clone());
    for index in 0..meta.top {
        run.enter(Stage::Fetching(index));
        let payload = service.fetch_node(&owner, record, index)?;
        let part = chunk::chunk_path(&prefix, index);
        fs::write(&part, payload).with_context(|| format!("failed to write {}", part.display()))?;
    }

    run.enter(Stage::Joining);
    let joined = chunk::join(session.selection.require_prefix()?)?;
    session.selection.select(joined);
    let current = session.selection.require_existing()?.to_path_buf();
    let payload_sha256 = util::file_sha256(&current)?;

    run.enter(Stage::Decompressing);
    let plain = compress::decompress(&current)?;
    session.selection.select(plain);

    run.enter(Stage::Unpacking);
    let current = session.selection.require_existing()?.to_path_buf();
    let extract_dir = session.area.extract_dir();
    archive::unpack(&current, &extract_dir)?;
    session.selection.select(extract_dir);

    // An empty site unpacks to an empty directory.
    let source = session.selection.require_present()?.to_path_buf();
    let files_copied = util::copy_contents(&source, output_dir)?;
    run.enter(Stage::Copied);

    Ok(DownloadOutcome {
        record: record.to_string(),
        owner,
        nodes: meta.top,
        payload_sha256,
        files_copied,
        output_dir: output_dir.to_path_buf(),
    })
}
