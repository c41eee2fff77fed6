use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const MAX_ACCOUNT_NAME_LEN: usize = 12;
const MAX_RECORD_NAME_LEN: usize = 64;

/// Account and permission used to authorize every mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountContext {
    pub actor: String,
    pub permission: String,
}

impl AccountContext {
    pub fn new(actor: &str, permission: &str) -> Result<Self> {
        validate_account_name("account", actor)?;
        validate_account_name("permission", permission)?;
        Ok(Self {
            actor: actor.to_string(),
            permission: permission.to_string(),
        })
    }
}

impl std::fmt::Display for AccountContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.actor, self.permission)
    }
}

/// One row of the service's record table, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub owner: String,
    pub filename: String,
    pub top: u64,
    #[serde(default)]
    pub published: u8,
    #[serde(default)]
    pub immutable: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaResponse {
    #[serde(default)]
    pub rows: Vec<RecordRow>,
    /// Response body exactly as the service sent it, when there was one.
    #[serde(skip)]
    pub raw: Option<String>,
}

impl MetaResponse {
    /// Metadata of `filename`, or `None` when no row names it. Rows for
    /// other records (a range scan running past the key) are ignored.
    pub fn record(&self, filename: &str) -> Option<RecordMeta> {
        self.rows
            .iter()
            .find(|row| row.filename == filename)
            .map(RecordMeta::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    pub owner: String,
    pub filename: String,
    pub top: u64,
    pub published: bool,
    pub immutable: bool,
}

impl RecordMeta {
    pub fn is_empty(&self) -> bool {
        self.top == 0
    }
}

impl From<&RecordRow> for RecordMeta {
    fn from(row: &RecordRow) -> Self {
        Self {
            owner: row.owner.clone(),
            filename: row.filename.clone(),
            top: row.top,
            published: row.published != 0,
            immutable: row.immutable != 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRow {
    pub nodeid: u64,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeResponse {
    #[serde(default)]
    pub rows: Vec<NodeRow>,
}

impl NodeResponse {
    pub fn payload_hex(&self) -> Option<&str> {
        self.rows.first().and_then(|row| row.data.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

fn invalid(message: String) -> anyhow::Error {
    anyhow::Error::new(PipelineError::InvalidConfiguration(message))
}

/// Ledger account names: 1-12 chars of `a-z`, `1-5` and `.`, not ending in `.`.
pub fn validate_account_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_ACCOUNT_NAME_LEN {
        return Err(invalid(format!(
            "{kind} `{name}` must be 1-{MAX_ACCOUNT_NAME_LEN} characters"
        )));
    }
    let valid = name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ('1'..='5').contains(&ch) || ch == '.');
    if !valid || name.ends_with('.') {
        return Err(invalid(format!(
            "{kind} `{name}` may only use a-z, 1-5 and `.` and must not end with `.`"
        )));
    }
    Ok(())
}

pub fn validate_record_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_RECORD_NAME_LEN {
        return Err(invalid(format!(
            "record name `{name}` must be 1-{MAX_RECORD_NAME_LEN} characters"
        )));
    }
    if name == "." || name == ".." {
        return Err(invalid(format!("record name `{name}` is reserved")));
    }
    let valid = name
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
    if !valid {
        return Err(invalid(format!(
            "record name `{name}` may only use letters, digits, `.`, `_` and `-`"
        )));
    }
    Ok(())
}
