use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::ledger::client::RecordService;
use crate::ledger::types::{AccountContext, RecordMeta};
use crate::site::audit;
use crate::site::config::SiteConfig;
use crate::site::paths::SitePaths;
use crate::site::workarea::WorkingArea;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selected {
    Artifact(PathBuf),
    /// A split prefix; its chunk files may not exist yet.
    Prefix(PathBuf),
}

/// The one artifact currently flowing through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    current: Option<Selected>,
}

impl Selection {
    pub fn select(&mut self, path: PathBuf) {
        self.current = Some(Selected::Artifact(path));
    }

    pub fn select_prefix(&mut self, prefix: PathBuf) {
        self.current = Some(Selected::Prefix(prefix));
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Path> {
        match &self.current {
            Some(Selected::Artifact(path)) | Some(Selected::Prefix(path)) => Some(path),
            None => None,
        }
    }

    /// The selected artifact, which must exist and be non-empty.
    pub fn require_existing(&self) -> Result<&Path> {
        let Some(Selected::Artifact(path)) = &self.current else {
            return Err(PipelineError::InvalidInput(
                "no artifact is selected for this stage".to_string(),
            )
            .into());
        };
        let meta = fs::metadata(path).map_err(|_| {
            PipelineError::InvalidInput(format!("selected {} does not exist", path.display()))
        })?;
        let empty = if meta.is_dir() {
            fs::read_dir(path)
                .with_context(|| format!("failed to read {}", path.display()))?
                .next()
                .is_none()
        } else {
            meta.len() == 0
        };
        if empty {
            return Err(
                PipelineError::InvalidInput(format!("selected {} is empty", path.display())).into(),
            );
        }
        Ok(path)
    }

    /// The selected artifact, which must exist but may be empty.
    pub fn require_present(&self) -> Result<&Path> {
        match &self.current {
            Some(Selected::Artifact(path)) if path.exists() => Ok(path),
            Some(Selected::Artifact(path)) => Err(PipelineError::InvalidInput(format!(
                "selected {} does not exist",
                path.display()
            ))
            .into()),
            _ => Err(PipelineError::InvalidInput(
                "no artifact is selected for this stage".to_string(),
            )
            .into()),
        }
    }

    pub fn require_prefix(&self) -> Result<&Path> {
        match &self.current {
            Some(Selected::Prefix(prefix)) => Ok(prefix),
            _ => Err(PipelineError::InvalidInput("no chunk prefix is selected".to_string()).into()),
        }
    }
}

/// Everything one pipeline run needs, passed explicitly to every stage.
#[derive(Debug, Clone)]
pub struct Session {
    pub paths: SitePaths,
    pub config: SiteConfig,
    pub area: WorkingArea,
    pub selection: Selection,
    account: Option<AccountContext>,
}

impl Session {
    pub fn new(paths: SitePaths, config: SiteConfig) -> Result<Self> {
        let account = match config.remote.account.as_deref() {
            Some(actor) => Some(AccountContext::new(actor, &config.remote.permission)?),
            None => None,
        };
        Ok(Self {
            area: WorkingArea::new(paths.work_dir.clone()),
            paths,
            config,
            selection: Selection::default(),
            account,
        })
    }

    pub fn account(&self) -> Option<&AccountContext> {
        self.account.as_ref()
    }

    pub fn require_account(&self) -> Result<&AccountContext> {
        self.account.as_ref().ok_or_else(|| {
            PipelineError::InvalidConfiguration(
                "no account configured; set NODESITE_ACCOUNT or pass --account".to_string(),
            )
            .into()
        })
    }

    /// Look up `record` and keep the raw response as `<record>.meta`.
    pub fn fetch_metadata(
        &self,
        service: &dyn RecordService,
        owner: &str,
        record: &str,
    ) -> Result<Option<RecordMeta>> {
        let response = service
            .fetch_metadata(owner, record)
            .with_context(|| format!("metadata lookup for `{record}` failed"))?;

        let cache = self.area.meta_path(record);
        let body = match &response.raw {
            Some(raw) => Ok(raw.clone()),
            None => serde_json::to_string_pretty(&response).map(|text| format!("{text}\n")),
        };
        match body {
            Ok(body) => {
                if let Err(err) = self.area.ensure().and_then(|_| {
                    fs::write(&cache, body)
                        .with_context(|| format!("failed to write {}", cache.display()))
                }) {
                    let detail = format!("{err:#}");
                    tracing::warn!(error = %detail, "metadata cache not written");
                }
            }
            Err(err) => tracing::warn!(%err, "metadata cache not serialized"),
        }

        Ok(response.record(record))
    }

    /// Audit failures are logged and never abort the run.
    pub fn audit(&self, phase: &str, status: &str, message: &str) {
        if let Err(err) = audit::append_event(&self.paths, phase, status, message) {
            let detail = format!("{err:#}");
            tracing::warn!(error = %detail, phase, status, "audit event not recorded");
        }
    }
}
