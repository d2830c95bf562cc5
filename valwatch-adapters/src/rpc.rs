//! Solana JSON-RPC gateway.
//!
//! Queries are addressed to one of two endpoints: the tracked validator's own
//! RPC port ([`Target::Validator`]) or a public cluster endpoint
//! ([`Target::Network`]). Every request is a JSON-RPC 2.0 `POST`; the client
//! carries a per-request timeout so one stalled node cannot hold a collection
//! cycle hostage.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use valwatch_adapters::{ChainQuery, RpcGateway};
//! use valwatch_types::Target;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = RpcGateway::builder()
//!         .validator_endpoint("http://localhost:8899")
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let accounts = gateway.vote_accounts(Target::Validator).await?;
//!     println!("{} current, {} delinquent", accounts.current.len(), accounts.delinquent.len());
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use valwatch_types::{
    ClusterNode, ConfirmedBlock, EpochInfo, NodeVersion, Target, VoteAccountsSnapshot,
};

use crate::{check_status, http_client, AdapterError, DEFAULT_TIMEOUT};

/// Typed chain-state queries.
///
/// This is the seam the collector depends on; tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    async fn epoch_info(&self, target: Target) -> Result<EpochInfo, AdapterError>;

    async fn vote_accounts(&self, target: Target) -> Result<VoteAccountsSnapshot, AdapterError>;

    async fn cluster_nodes(&self) -> Result<Vec<ClusterNode>, AdapterError>;

    async fn slot_leader(&self) -> Result<String, AdapterError>;

    async fn current_slot(&self, target: Target) -> Result<u64, AdapterError>;

    async fn tx_count(&self) -> Result<u64, AdapterError>;

    async fn confirmed_block(
        &self,
        target: Target,
        slot: u64,
    ) -> Result<ConfirmedBlock, AdapterError>;

    async fn version(&self) -> Result<NodeVersion, AdapterError>;

    /// Account balance in lamports.
    async fn balance(&self, target: Target, pubkey: &str) -> Result<u64, AdapterError>;
}

/// JSON-RPC client for a validator endpoint and a network endpoint.
#[derive(Debug, Clone)]
pub struct RpcGateway {
    client: Client,
    validator_endpoint: String,
    network_endpoint: String,
}

impl RpcGateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> RpcGatewayBuilder {
        RpcGatewayBuilder::default()
    }

    pub fn endpoint(&self, target: Target) -> &str {
        match target {
            Target::Validator => &self.validator_endpoint,
            Target::Network => &self.network_endpoint,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        target: Target,
        method: &str,
        params: Value,
    ) -> Result<T, AdapterError> {
        let url = self.endpoint(target);
        debug!(%target, method, "rpc request");

        let response = self
            .client
            .post(url)
            .json(&request_body(method, params))
            .send()
            .await?;
        let response = check_status(response, method).await?;

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(format!("{}: {}", method, e)))?;

        envelope.into_result(method)
    }
}

#[async_trait]
impl ChainQuery for RpcGateway {
    async fn epoch_info(&self, target: Target) -> Result<EpochInfo, AdapterError> {
        self.call(target, "getEpochInfo", json!([])).await
    }

    async fn vote_accounts(&self, target: Target) -> Result<VoteAccountsSnapshot, AdapterError> {
        self.call(target, "getVoteAccounts", json!([])).await
    }

    async fn cluster_nodes(&self) -> Result<Vec<ClusterNode>, AdapterError> {
        self.call(Target::Validator, "getClusterNodes", json!([]))
            .await
    }

    async fn slot_leader(&self) -> Result<String, AdapterError> {
        self.call(Target::Validator, "getSlotLeader", json!([]))
            .await
    }

    async fn current_slot(&self, target: Target) -> Result<u64, AdapterError> {
        self.call(target, "getSlot", json!([])).await
    }

    async fn tx_count(&self) -> Result<u64, AdapterError> {
        self.call(Target::Validator, "getTransactionCount", json!([]))
            .await
    }

    async fn confirmed_block(
        &self,
        target: Target,
        slot: u64,
    ) -> Result<ConfirmedBlock, AdapterError> {
        let params = json!([
            slot,
            {
                "encoding": "json",
                "transactionDetails": "none",
                "rewards": false,
                "maxSupportedTransactionVersion": 0
            }
        ]);
        self.call(target, "getBlock", params).await
    }

    async fn version(&self) -> Result<NodeVersion, AdapterError> {
        self.call(Target::Validator, "getVersion", json!([])).await
    }

    async fn balance(&self, target: Target, pubkey: &str) -> Result<u64, AdapterError> {
        let result: BalanceResult = self.call(target, "getBalance", json!([pubkey])).await?;
        Ok(result.value)
    }
}

/// Builder for RpcGateway.
#[derive(Debug, Default)]
pub struct RpcGatewayBuilder {
    validator_endpoint: Option<String>,
    network_endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl RpcGatewayBuilder {
    /// Set the tracked validator's RPC endpoint (e.g., "http://localhost:8899").
    pub fn validator_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.validator_endpoint = Some(endpoint.into());
        self
    }

    /// Set the cluster RPC endpoint used for network-wide comparisons.
    pub fn network_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.network_endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 5 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gateway. Without an explicit network endpoint, network
    /// queries go to the validator endpoint.
    pub fn build(self) -> Result<RpcGateway, AdapterError> {
        let client = http_client(self.timeout.unwrap_or(DEFAULT_TIMEOUT))?;
        let validator_endpoint = self
            .validator_endpoint
            .unwrap_or_else(|| "http://localhost:8899".to_string());
        let network_endpoint = self
            .network_endpoint
            .unwrap_or_else(|| validator_endpoint.clone());

        Ok(RpcGateway {
            client,
            validator_endpoint,
            network_endpoint,
        })
    }
}

fn request_body(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T, AdapterError> {
        if let Some(err) = self.error {
            return Err(AdapterError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or_else(|| AdapterError::MissingResult {
            method: method.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: DeserializeOwned>(json: &str, method: &str) -> Result<T, AdapterError> {
        serde_json::from_str::<RpcResponse<T>>(json)
            .unwrap()
            .into_result(method)
    }

    #[test]
    fn test_builder_defaults() {
        let gateway = RpcGateway::builder().build().unwrap();
        assert_eq!(gateway.endpoint(Target::Validator), "http://localhost:8899");
        assert_eq!(gateway.endpoint(Target::Network), "http://localhost:8899");
    }

    #[test]
    fn test_builder_custom() {
        let gateway = RpcGateway::builder()
            .validator_endpoint("http://10.0.0.5:8899")
            .network_endpoint("https://api.mainnet-beta.solana.com")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(gateway.endpoint(Target::Validator), "http://10.0.0.5:8899");
        assert_eq!(
            gateway.endpoint(Target::Network),
            "https://api.mainnet-beta.solana.com"
        );
    }

    #[test]
    fn test_request_body() {
        let body = request_body("getSlot", json!([]));
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "getSlot");
        assert!(body["params"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_epoch_info_envelope() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{
            "absoluteSlot":166598,"blockHeight":166500,"epoch":27,
            "slotIndex":2790,"slotsInEpoch":8192,"transactionCount":22661093
        }}"#;
        let info: EpochInfo = parse(json, "getEpochInfo").unwrap();
        assert_eq!(info.epoch, 27);
        assert_eq!(info.absolute_slot, 166598);
        assert_eq!(info.transaction_count, Some(22661093));
    }

    #[test]
    fn test_balance_envelope() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":1},"value":2500000000}}"#;
        let balance: BalanceResult = parse(json, "getBalance").unwrap();
        assert_eq!(balance.value, 2_500_000_000);
    }

    #[test]
    fn test_rpc_error_envelope() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32009,"message":"Slot 100 was skipped"}}"#;
        let err = parse::<ConfirmedBlock>(json, "getBlock").unwrap_err();
        match err {
            AdapterError::Rpc { code, message } => {
                assert_eq!(code, -32009);
                assert!(message.contains("skipped"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_null_result_is_missing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let err = parse::<ConfirmedBlock>(json, "getBlock").unwrap_err();
        assert!(matches!(err, AdapterError::MissingResult { .. }));
    }

    #[test]
    fn test_cluster_nodes_envelope() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":[
            {"pubkey":"node1","gossip":"10.0.0.1:8001","tpu":"10.0.0.1:8004"},
            {"pubkey":"node2","gossip":null}
        ]}"#;
        let nodes: Vec<ClusterNode> = parse(json, "getClusterNodes").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].gossip.as_deref(), Some("10.0.0.1:8001"));
        assert_eq!(nodes[1].gossip, None);
    }
}
