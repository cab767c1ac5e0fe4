use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ChainError;

/// JSON-RPC 2.0 client for an Ethereum node.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("trustquests/0.3")
            .build()
            .unwrap_or_default();

        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": id });
        debug!(method = %method, id, "rpc request");

        let response = self.http.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(ChainError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{} returned no result", method)))
    }

    /// Read-only call against the latest block.
    pub async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let params = json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]);
        let result: String = self.request("eth_call", params).await?;
        decode_hex(&result)
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let result: String = self.request("eth_chainId", json!([])).await?;
        Ok(parse_quantity(&result)? as u64)
    }

    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        let result: String = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn transaction_count(&self, address: &str) -> Result<u64, ChainError> {
        let result: String = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(parse_quantity(&result)? as u64)
    }

    /// Returns the transaction hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, ChainError> {
        self.request(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }
}

/// Parse a hex quantity such as `0x1b4`.
pub fn parse_quantity(raw: &str) -> Result<u128, ChainError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity '{}': {}", raw, e)))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, ChainError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| ChainError::InvalidResponse(e.to_string()))
}
