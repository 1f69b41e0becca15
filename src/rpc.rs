//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to Ethereum JSON-RPC endpoints.
//! Handles hex string parsing, bounded retries, and error handling.
//! The `ChainClient` trait is the seam between the evidence pipeline
//! and the network so tests can substitute a scripted connection.

use crate::error::ProviderInitError;
use crate::retry::{retry, RetryPolicy};
use crate::types::{RawLog, Receipt, Transaction};
use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Read-only chain connection capability consumed by the engine.
///
/// Receipt and transaction lookups return `Ok(None)` for unknown
/// hashes; absence is a normal outcome, not an error.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Get a transaction receipt by hash.
    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>>;

    /// Get a transaction by hash.
    async fn get_transaction(&self, tx_hash: B256) -> Result<Option<Transaction>>;

    /// Get all logs emitted by `address` in the inclusive block range.
    async fn get_logs(&self, address: Address, from_block: u64, to_block: u64)
        -> Result<Vec<RawLog>>;

    /// Get the current chain height.
    async fn get_block_number(&self) -> Result<u64>;

    /// Execute a read-only call against `to` at the latest block.
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>>;
}

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    fetch_retry: RetryPolicy,
}

impl RpcClient {
    /// Create a new RPC client without probing the endpoint.
    ///
    /// Receipt/transaction fetches retry 3 times with a fixed 1-second
    /// delay on transient failure.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            fetch_retry: RetryPolicy::fixed(3, Duration::from_secs(1)),
        }
    }

    /// Create a client and verify the endpoint is live.
    ///
    /// Makes up to 3 connection attempts with linear backoff (attempt
    /// number x 1 second); a successful `eth_blockNumber` probe is
    /// required to consider the connection live. Failing the budget is
    /// fatal.
    pub async fn connect(url: String) -> Result<Self, ProviderInitError> {
        let policy = RetryPolicy::linear(3, Duration::from_secs(1));
        let client = Self::new(url);

        match retry(&policy, "eth_blockNumber probe", || client.block_number_once()).await {
            Ok(height) => {
                info!("Connected to {} (height {})", client.url, height);
                Ok(client)
            }
            Err(e) => Err(ProviderInitError {
                attempts: policy.max_attempts,
                last_error: format!("{:#}", e),
            }),
        }
    }

    /// Make a JSON-RPC call.
    async fn call_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send RPC request")?;

        let json: Value = response
            .json()
            .await
            .context("Failed to parse RPC response")?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error: {}", error);
        }

        // Extract result
        json.get("result")
            .cloned()
            .context("RPC response missing 'result' field")
    }

    /// Single `eth_blockNumber` query without retries.
    async fn block_number_once(&self) -> Result<u64> {
        let result = self.call_rpc("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&result).context("Failed to parse block number")
    }

    /// Single receipt fetch without retries. JSON null means the
    /// transaction is unknown to the node.
    async fn get_receipt_once(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        let hash_str = format!("0x{:x}", tx_hash);
        let result = self
            .call_rpc("eth_getTransactionReceipt", json!([hash_str]))
            .await?;
        serde_json::from_value(result).context("Failed to deserialize receipt")
    }

    /// Single transaction fetch without retries.
    async fn get_transaction_once(&self, tx_hash: B256) -> Result<Option<Transaction>> {
        let hash_str = format!("0x{:x}", tx_hash);
        let result = self
            .call_rpc("eth_getTransactionByHash", json!([hash_str]))
            .await?;
        serde_json::from_value(result).context("Failed to deserialize transaction")
    }
}

impl ChainClient for RpcClient {
    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        retry(&self.fetch_retry, "eth_getTransactionReceipt", || {
            self.get_receipt_once(tx_hash)
        })
        .await
    }

    async fn get_transaction(&self, tx_hash: B256) -> Result<Option<Transaction>> {
        retry(&self.fetch_retry, "eth_getTransactionByHash", || {
            self.get_transaction_once(tx_hash)
        })
        .await
    }

    async fn get_logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>> {
        let filter = json!([{
            "address": format!("0x{:x}", address),
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        }]);
        let result = self.call_rpc("eth_getLogs", filter).await?;
        serde_json::from_value(result).context("Failed to deserialize logs")
    }

    async fn get_block_number(&self) -> Result<u64> {
        self.block_number_once().await
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let params = json!([
            {
                "to": format!("0x{:x}", to),
                "data": format!("0x{}", hex::encode(&data)),
            },
            "latest"
        ]);
        let result = self.call_rpc("eth_call", params).await?;

        let ret_str = result
            .as_str()
            .context("eth_call response is not a string")?;
        let ret_str = ret_str.strip_prefix("0x").unwrap_or(ret_str);
        if ret_str.is_empty() {
            return Ok(Vec::new());
        }

        // Handle odd-length hex strings by padding with a leading zero
        let ret_str = if ret_str.len() % 2 == 1 {
            format!("0{}", ret_str)
        } else {
            ret_str.to_string()
        };

        hex::decode(&ret_str).context("Failed to decode eth_call return data")
    }
}

/// Parse a hex scalar result (e.g. "0x10") into u64.
fn parse_hex_u64(value: &Value) -> Result<u64> {
    let s = value.as_str().context("Result is not a string")?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        anyhow::bail!("Hex scalar is empty");
    }
    u64::from_str_radix(s, 16).context("Failed to parse hex scalar")
}
