use anyhow::Result;

use crate::commands::{CommandReport, GlobalOptions, load_session};
use crate::site::config::ConfigOverrides;

pub fn run(globals: &GlobalOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    let session = match load_session(globals, ConfigOverrides::default()) {
        Ok(session) => session,
        Err(err) => {
            report.issue(format!("configuration invalid: {err:#}"));
            return Ok(report);
        }
    };
    let paths = &session.paths;
    let cfg = &session.config;

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("work_dir={}", paths.work_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "config_file={} ({})",
        paths.config_file.display(),
        if paths.config_file.exists() {
            "present"
        } else {
            "absent"
        }
    ));
    report.detail(format!("endpoint={}", cfg.remote.endpoint));
    report.detail(format!("contract={}", cfg.remote.contract));
    report.detail(format!("permission={}", cfg.remote.permission));
    report.detail(format!("chunk_size={}", cfg.transfer.chunk_size));
    report.detail(format!("brotli_quality={}", cfg.transfer.brotli_quality));

    match session.account() {
        Some(account) => report.detail(format!("account={account}")),
        None => report.issue("no account configured (NODESITE_ACCOUNT or [remote].account)"),
    }

    Ok(report)
}
