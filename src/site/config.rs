use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::PipelineError;
use crate::ledger::types::validate_account_name;
use crate::site::chunk::{DEFAULT_CHUNK_BYTES, validate_chunk_size};
use crate::site::compress::{DEFAULT_BROTLI_QUALITY, MAX_BROTLI_QUALITY};
use crate::site::paths::SitePaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub contract: String,
    pub account: Option<String>,
    pub permission: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8888".to_string(),
            contract: "sitenodes".to_string(),
            account: None,
            permission: "active".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_size: u64,
    pub brotli_quality: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_BYTES,
            brotli_quality: DEFAULT_BROTLI_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SiteConfig {
    pub remote: RemoteConfig,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSiteConfig {
    remote: Option<RemoteConfig>,
    transfer: Option<TransferConfig>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub contract: Option<String>,
    pub account: Option<String>,
    pub permission: Option<String>,
    pub chunk_size: Option<u64>,
}

fn parse_u64_value(var: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid(format!("{var}=`{}` is not a whole number", raw.trim())))
}

fn env_or_u64(var: &str, fallback: u64) -> Result<u64> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => parse_u64_value(var, &v),
        _ => Ok(fallback),
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn invalid(message: String) -> anyhow::Error {
    anyhow::Error::new(PipelineError::InvalidConfiguration(message))
}

pub fn validate(cfg: &SiteConfig) -> Result<()> {
    let endpoint = cfg.remote.endpoint.trim();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(invalid(format!(
            "endpoint `{endpoint}` must start with http:// or https://"
        )));
    }
    validate_account_name("contract", &cfg.remote.contract)?;
    validate_account_name("permission", &cfg.remote.permission)?;
    if let Some(account) = cfg.remote.account.as_deref() {
        validate_account_name("account", account)?;
    }
    validate_chunk_size(cfg.transfer.chunk_size)?;
    if cfg.transfer.brotli_quality > MAX_BROTLI_QUALITY {
        return Err(invalid(format!(
            "brotli quality {} out of range 0..={MAX_BROTLI_QUALITY}",
            cfg.transfer.brotli_quality
        )));
    }
    Ok(())
}

fn parse_config_str(raw: &str, base: &mut SiteConfig) -> Result<()> {
    let parsed: PartialSiteConfig =
        toml::from_str(raw).map_err(|err| anyhow!("failed to parse config: {err}"))?;
    if let Some(remote) = parsed.remote {
        base.remote = remote;
    }
    if let Some(transfer) = parsed.transfer {
        base.transfer = transfer;
    }
    Ok(())
}

fn merge_file_config(path: &Path, base: &mut SiteConfig) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path)?;
    parse_config_str(&raw, base)
        .map_err(|err| anyhow!("failed to load nodesite config {}: {err}", path.display()))
}

fn merge_env(cfg: &mut SiteConfig) -> Result<()> {
    cfg.remote.endpoint = env_or_string("NODESITE_ENDPOINT", &cfg.remote.endpoint);
    cfg.remote.contract = env_or_string("NODESITE_CONTRACT", &cfg.remote.contract);
    cfg.remote.account = env_optional_string("NODESITE_ACCOUNT", cfg.remote.account.take());
    cfg.remote.permission = env_or_string("NODESITE_PERMISSION", &cfg.remote.permission);
    cfg.transfer.chunk_size = env_or_u64("NODESITE_CHUNK_SIZE", cfg.transfer.chunk_size)?;
    let quality = env_or_u64(
        "NODESITE_BROTLI_QUALITY",
        u64::from(cfg.transfer.brotli_quality),
    )?;
    cfg.transfer.brotli_quality = u32::try_from(quality).unwrap_or(u32::MAX);
    Ok(())
}

fn apply_overrides(cfg: &mut SiteConfig, overrides: &ConfigOverrides) {
    if let Some(endpoint) = &overrides.endpoint {
        cfg.remote.endpoint = endpoint.trim().to_string();
    }
    if let Some(contract) = &overrides.contract {
        cfg.remote.contract = contract.trim().to_string();
    }
    if let Some(account) = &overrides.account {
        cfg.remote.account = Some(account.trim().to_string());
    }
    if let Some(permission) = &overrides.permission {
        cfg.remote.permission = permission.trim().to_string();
    }
    if let Some(chunk_size) = overrides.chunk_size {
        cfg.transfer.chunk_size = chunk_size;
    }
}

/// Defaults, then the TOML file, then `NODESITE_*` variables, then flags.
pub fn load_config(paths: &SitePaths, overrides: &ConfigOverrides) -> Result<SiteConfig> {
    let mut cfg = SiteConfig::default();
    merge_file_config(&paths.config_file, &mut cfg)?;
    merge_env(&mut cfg)?;
    apply_overrides(&mut cfg, overrides);
    validate(&cfg)?;
    Ok(cfg)
}
