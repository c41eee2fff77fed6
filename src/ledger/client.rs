use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::ledger::types::{AccountContext, ActionResponse, MetaResponse, NodeResponse};

const META_PATH: &str = "/v1/record/get_meta";
const NODE_PATH: &str = "/v1/record/get_node";
const ACTION_PATH: &str = "/v1/record/push_action";

/// The remote operations the transfer pipeline needs from the ledger.
///
/// Implementations carry their own session configuration (endpoint,
/// contract, authorization); callers only name the record and payload.
pub trait RecordService {
    fn fetch_metadata(&self, owner: &str, name: &str) -> Result<MetaResponse>;
    fn create_record(&self, owner: &str, name: &str) -> Result<()>;
    /// Appends `payload` as node `index`; the caller has checked that
    /// `index` equals the record's current node count.
    fn append_node(&self, owner: &str, name: &str, index: u64, payload: &[u8]) -> Result<()>;
    fn fetch_node(&self, owner: &str, name: &str, index: u64) -> Result<Vec<u8>>;
    fn delete_top_node(&self, owner: &str, name: &str) -> Result<()>;
    fn reset_all_nodes(&self, owner: &str, name: &str) -> Result<()>;
    fn delete_record(&self, owner: &str, name: &str) -> Result<()>;
    fn set_published(&self, owner: &str, name: &str, published: bool) -> Result<()>;
    fn set_immutable(&self, owner: &str, name: &str) -> Result<()>;
}

pub struct HttpRecordService {
    client: Client,
    endpoint: String,
    contract: String,
    auth: Option<AccountContext>,
}

fn rejected(action: &str, message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(PipelineError::RemoteRejected {
        action: action.to_string(),
        message: message.into(),
    })
}

impl HttpRecordService {
    pub fn new(endpoint: &str, contract: &str, auth: Option<AccountContext>) -> Result<Self> {
        // Remote calls block until the service answers.
        let client = Client::builder()
            .timeout(None)
            .build()
            .context("failed to build ledger http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            contract: contract.to_string(),
            auth,
        })
    }

    fn post<T: DeserializeOwned>(&self, path: &str, action: &str, body: &Value) -> Result<T> {
        let raw = self.post_raw(path, action, body)?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON from ledger `{action}`: {}", raw.trim()))
    }

    fn post_raw(&self, path: &str, action: &str, body: &Value) -> Result<String> {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to reach ledger at {url}"))?;
        let status = response.status();
        let raw = response
            .text()
            .with_context(|| format!("failed to read ledger response from {url}"))?;
        if !status.is_success() {
            return Err(rejected(action, format!("http {status}: {}", raw.trim())));
        }
        Ok(raw)
    }

    fn push_action(&self, action: &str, data: Value) -> Result<()> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            anyhow::Error::new(PipelineError::InvalidConfiguration(format!(
                "`{action}` requires an account; set NODESITE_ACCOUNT or pass --account"
            )))
        })?;
        let body = json!({
            "contract": self.contract,
            "action": action,
            "authorization": {
                "actor": auth.actor,
                "permission": auth.permission,
            },
            "data": data,
        });
        let response: ActionResponse = self.post(ACTION_PATH, action, &body)?;
        if response.code != 0 {
            let message = response
                .message
                .unwrap_or_else(|| format!("code {}", response.code));
            return Err(rejected(action, message));
        }
        tracing::debug!(action, actor = %auth, "ledger action accepted");
        Ok(())
    }
}

impl RecordService for HttpRecordService {
    fn fetch_metadata(&self, owner: &str, name: &str) -> Result<MetaResponse> {
        let body = json!({
            "contract": self.contract,
            "owner": owner,
            "filename": name,
        });
        let raw = self.post_raw(META_PATH, "get_meta", &body)?;
        let mut response: MetaResponse = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON from ledger `get_meta`: {}", raw.trim()))?;
        response.raw = Some(raw);
        Ok(response)
    }

    fn create_record(&self, owner: &str, name: &str) -> Result<()> {
        self.push_action("create", json!({ "owner": owner, "filename": name }))
    }

    fn append_node(&self, owner: &str, name: &str, index: u64, payload: &[u8]) -> Result<()> {
        self.push_action(
            "append",
            json!({
                "owner": owner,
                "filename": name,
                "nodeid": index,
                "data": hex::encode(payload),
            }),
        )
    }

    fn fetch_node(&self, owner: &str, name: &str, index: u64) -> Result<Vec<u8>> {
        let body = json!({
            "contract": self.contract,
            "owner": owner,
            "filename": name,
            "nodeid": index,
        });
        let response: NodeResponse = self.post(NODE_PATH, "get_node", &body)?;
        let Some(data) = response.payload_hex() else {
            return Err(anyhow::Error::new(PipelineError::NodeNotFound {
                record: name.to_string(),
                index,
            }));
        };
        hex::decode(data).with_context(|| format!("node {index} of `{name}` is not valid hex"))
    }

    fn delete_top_node(&self, owner: &str, name: &str) -> Result<()> {
        self.push_action("pop", json!({ "owner": owner, "filename": name }))
    }

    fn reset_all_nodes(&self, owner: &str, name: &str) -> Result<()> {
        self.push_action("reset", json!({ "owner": owner, "filename": name }))
    }

    fn delete_record(&self, owner: &str, name: &str) -> Result<()> {
        self.push_action("remove", json!({ "owner": owner, "filename": name }))
    }

    fn set_published(&self, owner: &str, name: &str, published: bool) -> Result<()> {
        self.push_action(
            "publish",
            json!({
                "owner": owner,
                "filename": name,
                "published": u8::from(published),
            }),
        )
    }

    fn set_immutable(&self, owner: &str, name: &str) -> Result<()> {
        self.push_action("freeze", json!({ "owner": owner, "filename": name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::pipeline_error;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let svc = HttpRecordService::new("http://127.0.0.1:8888/", "sitenodes", None)
            .expect("client");
        assert_eq!(svc.endpoint, "http://127.0.0.1:8888");
    }

    #[test]
    fn mutation_without_account_is_a_configuration_error() {
        let svc =
            HttpRecordService::new("http://127.0.0.1:9", "sitenodes", None).expect("client");
        let err = svc.create_record("alice", "site").expect_err("no account");
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::InvalidConfiguration(_))
        ));
    }
}
