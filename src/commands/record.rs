use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, GlobalOptions, load_session, record_service};
use crate::error::PipelineError;
use crate::ledger::client::RecordService;
use crate::ledger::types::validate_record_name;
use crate::site::config::ConfigOverrides;
use crate::site::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Pop,
    Reset,
    Remove,
    Publish,
    Unpublish,
    Freeze,
}

impl RecordAction {
    pub fn label(self) -> &'static str {
        match self {
            RecordAction::Pop => "pop",
            RecordAction::Reset => "reset",
            RecordAction::Remove => "remove",
            RecordAction::Publish => "publish",
            RecordAction::Unpublish => "unpublish",
            RecordAction::Freeze => "freeze",
        }
    }

    fn apply(self, service: &dyn RecordService, owner: &str, record: &str) -> Result<()> {
        match self {
            RecordAction::Pop => service.delete_top_node(owner, record),
            RecordAction::Reset => service.reset_all_nodes(owner, record),
            RecordAction::Remove => service.delete_record(owner, record),
            RecordAction::Publish => service.set_published(owner, record, true),
            RecordAction::Unpublish => service.set_published(owner, record, false),
            RecordAction::Freeze => service.set_immutable(owner, record),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub record: String,
    pub owner: Option<String>,
    pub account: Option<String>,
    pub permission: Option<String>,
}

fn session_for(globals: &GlobalOptions, opts: &RecordOptions) -> Result<Session> {
    validate_record_name(&opts.record)?;
    load_session(
        globals,
        ConfigOverrides {
            account: opts.account.clone(),
            permission: opts.permission.clone(),
            ..ConfigOverrides::default()
        },
    )
}

fn owner_for(session: &Session, opts: &RecordOptions) -> Result<String> {
    if let Some(owner) = &opts.owner {
        return Ok(owner.clone());
    }
    Ok(session.require_account()?.actor.clone())
}

pub fn run_action(
    globals: &GlobalOptions,
    opts: &RecordOptions,
    action: RecordAction,
) -> Result<CommandReport> {
    let session = session_for(globals, opts)?;
    let service = record_service(&session)?;
    let owner = owner_for(&session, opts)?;
    let mut report = CommandReport::new(action.label());

    tracing::info!(action = action.label(), record = %opts.record, %owner, "submitting record action");
    action
        .apply(&service, &owner, &opts.record)
        .with_context(|| format!("`{}` on `{}` failed", action.label(), opts.record))?;
    session.audit(action.label(), "ok", &format!("record={} owner={owner}", opts.record));

    report.detail(format!("record={}", opts.record));
    report.detail(format!("owner={owner}"));
    report.detail(format!("{}=done", action.label()));
    Ok(report)
}

pub fn run_meta(globals: &GlobalOptions, opts: &RecordOptions) -> Result<CommandReport> {
    let session = session_for(globals, opts)?;
    let service = record_service(&session)?;
    let owner = owner_for(&session, opts)?;
    let mut report = CommandReport::new("meta");

    report.detail(format!("record={}", opts.record));
    let Some(meta) = session.fetch_metadata(&service, &owner, &opts.record)? else {
        report.issue(PipelineError::RecordNotFound(opts.record.clone()).to_string());
        return Ok(report);
    };
    report.detail(format!("owner={}", meta.owner));
    report.detail(format!("top={}", meta.top));
    report.detail(format!("published={}", meta.published));
    report.detail(format!("immutable={}", meta.immutable));
    report.detail(format!(
        "cached={}",
        session.area.meta_path(&opts.record).display()
    ));
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub target: RecordOptions,
    pub index: u64,
    pub out: PathBuf,
}

pub fn run_node(globals: &GlobalOptions, opts: &NodeOptions) -> Result<CommandReport> {
    let session = session_for(globals, &opts.target)?;
    let service = record_service(&session)?;
    let owner = owner_for(&session, &opts.target)?;
    let mut report = CommandReport::new("node");

    let payload = service.fetch_node(&owner, &opts.target.record, opts.index)?;
    if let Some(parent) = opts.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&opts.out, &payload)
        .with_context(|| format!("failed to write {}", opts.out.display()))?;

    report.detail(format!("record={}", opts.target.record));
    report.detail(format!("index={}", opts.index));
    report.detail(format!("bytes={}", payload.len()));
    report.detail(format!("out={}", opts.out.display()));
    Ok(report)
}
