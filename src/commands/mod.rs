pub mod download;
pub mod local;
pub mod record;
pub mod status;
pub mod upload;

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::ledger::client::HttpRecordService;
use crate::site::config::{ConfigOverrides, load_config};
use crate::site::paths::resolve_paths;
use crate::site::session::Session;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// A condition worth showing that does not fail the command.
    pub fn warning(&mut self, text: impl Into<String>) {
        self.details.push(format!("warning: {}", text.into()));
    }
}

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub endpoint: Option<String>,
    pub contract: Option<String>,
    pub work_dir: Option<PathBuf>,
}

pub fn load_session(globals: &GlobalOptions, mut overrides: ConfigOverrides) -> Result<Session> {
    let mut paths = resolve_paths()?;
    if let Some(work_dir) = &globals.work_dir {
        paths.work_dir = work_dir.clone();
    }
    if overrides.endpoint.is_none() {
        overrides.endpoint = globals.endpoint.clone();
    }
    if overrides.contract.is_none() {
        overrides.contract = globals.contract.clone();
    }
    let config = load_config(&paths, &overrides)?;
    Session::new(paths, config)
}

pub fn record_service(session: &Session) -> Result<HttpRecordService> {
    HttpRecordService::new(
        &session.config.remote.endpoint,
        &session.config.remote.contract,
        session.account().cloned(),
    )
}
