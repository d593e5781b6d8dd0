//! Space directory: resolves an ENS space name into the contract
//! addresses the scanner watches. The module address comes from the
//! Snapshot GraphQL API (the space's safeSnap plugin); the oracle is
//! then read from the module itself.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

use govwatch_core::{GovWatchError, Result};

use crate::rpc::RpcClient;

/// `oracle()` function selector.
const ORACLE_SELECTOR: &str = "0x7dc0d1d0";

const GRAPHQL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SpaceAddresses {
    pub module_address: String,
    pub oracle_address: String,
}

#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    async fn resolve(&self, ens: &str) -> Result<SpaceAddresses>;
}

/// Directory backed by the public Snapshot hub and the chain itself.
pub struct SnapshotDirectory {
    graphql_url: String,
    http: reqwest::Client,
    rpc: RpcClient,
}

impl SnapshotDirectory {
    pub fn new(graphql_url: impl Into<String>, rpc: RpcClient) -> Self {
        Self {
            graphql_url: graphql_url.into(),
            http: reqwest::Client::new(),
            rpc,
        }
    }

    async fn module_address(&self, ens: &str) -> Result<String> {
        let err = |msg: String| GovWatchError::Directory(msg);

        let query = r#"query Space($ens: String!) { space(id: $ens) { plugins } }"#;
        let resp = self
            .http
            .post(&self.graphql_url)
            .json(&json!({ "query": query, "variables": { "ens": ens } }))
            .timeout(GRAPHQL_TIMEOUT)
            .send()
            .await
            .map_err(|e| err(format!("snapshot query for {ens} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(err(format!("snapshot query for {ens}: HTTP {}", resp.status())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| err(format!("snapshot query for {ens}: invalid response: {e}")))?;

        // Plugins arrive as a free-form JSON object; only safeSnap
        // carries a module address.
        body.pointer("/data/space/plugins/safeSnap/address")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| err(format!("space {ens} has no safeSnap plugin address")))
    }

    async fn oracle_address(&self, module_address: &str) -> Result<String> {
        let result = self.rpc.eth_call(module_address, ORACLE_SELECTOR).await?;
        let digits = result
            .strip_prefix("0x")
            .ok_or_else(|| GovWatchError::Directory(format!("oracle() returned {result}")))?;
        if digits.len() < 40 {
            return Err(GovWatchError::Directory(format!(
                "oracle() of {module_address} returned a short word: {result}"
            )));
        }
        Ok(format!("0x{}", &digits[digits.len() - 40..]))
    }
}

#[async_trait]
impl SpaceDirectory for SnapshotDirectory {
    async fn resolve(&self, ens: &str) -> Result<SpaceAddresses> {
        let module_address = self.module_address(ens).await?;
        let oracle_address = self.oracle_address(&module_address).await?;
        Ok(SpaceAddresses {
            module_address,
            oracle_address,
        })
    }
}
