use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, GlobalOptions, load_session, record_service};
use crate::site::config::ConfigOverrides;
use crate::site::orchestrator::website_upload;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub record: String,
    pub input: PathBuf,
    pub account: Option<String>,
    pub permission: Option<String>,
    pub chunk_size: Option<u64>,
}

pub fn run(globals: &GlobalOptions, opts: &UploadOptions) -> Result<CommandReport> {
    let mut session = load_session(
        globals,
        ConfigOverrides {
            account: opts.account.clone(),
            permission: opts.permission.clone(),
            chunk_size: opts.chunk_size,
            ..ConfigOverrides::default()
        },
    )?;
    let service = record_service(&session)?;
    let mut report = CommandReport::new("upload");

    report.detail(format!("endpoint={}", session.config.remote.endpoint));
    report.detail(format!("contract={}", session.config.remote.contract));
    report.detail(format!("input={}", opts.input.display()));
    report.detail(format!("chunk_size={}", session.config.transfer.chunk_size));

    let out = website_upload(&mut session, &service, &opts.record, &opts.input)?;
    for warning in &out.warnings {
        report.warning(warning.to_string());
    }
    report.detail(format!("record={}", out.record));
    report.detail(format!("owner={}", out.owner));
    report.detail(format!("created={}", out.created));
    report.detail(format!("archive={}", out.archive_path.display()));
    report.detail(format!("payload_bytes={}", out.payload_bytes));
    report.detail(format!("payload_sha256={}", out.payload_sha256));
    report.detail(format!("nodes={}", out.nodes));
    report.detail("published=true");
    Ok(report)
}
