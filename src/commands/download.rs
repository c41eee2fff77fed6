use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, GlobalOptions, load_session, record_service};
use crate::site::config::ConfigOverrides;
use crate::site::orchestrator::website_download;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub record: String,
    pub output: PathBuf,
    pub account: Option<String>,
}

pub fn run(globals: &GlobalOptions, opts: &DownloadOptions) -> Result<CommandReport> {
    let mut session = load_session(
        globals,
        ConfigOverrides {
            account: opts.account.clone(),
            ..ConfigOverrides::default()
        },
    )?;
    let service = record_service(&session)?;
    let mut report = CommandReport::new("download");

    report.detail(format!("endpoint={}", session.config.remote.endpoint));
    let out = website_download(&mut session, &service, &opts.record, &opts.output)?;
    report.detail(format!("record={}", out.record));
    report.detail(format!("owner={}", out.owner));
    report.detail(format!("nodes={}", out.nodes));
    report.detail(format!("payload_sha256={}", out.payload_sha256));
    report.detail(format!("files_copied={}", out.files_copied));
    report.detail(format!("output={}", out.output_dir.display()));
    Ok(report)
}
