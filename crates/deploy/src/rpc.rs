//! JSON-RPC access to an EVM node.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Default timeout for RPC requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// An error object returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Make a JSON-RPC call and deserialize the result.
///
/// Error objects returned by the node are surfaced as [`RpcError`], so that callers can
/// tell a rejected request apart from a transport failure with `downcast_ref`.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        let error = RpcError::deserialize(error).unwrap_or_else(|_| RpcError {
            code: 0,
            message: error.to_string(),
        });
        return Err(error.into());
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// The subset of a transaction receipt the pipeline inspects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub block_number: u64,
    pub contract_address: Option<Address>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: Option<bool>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.unwrap_or(true)
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| parse_hex_u64(&s).map(|v| v == 1))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// A call used for gas estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub data: Bytes,
    pub value: U256,
}

/// The node operations the deployment pipeline depends on.
pub trait ChainProvider: Send + Sync {
    /// `eth_chainId`
    fn chain_id(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// `eth_getTransactionCount` against the pending block.
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// `eth_gasPrice`
    fn gas_price(&self) -> impl Future<Output = anyhow::Result<u128>> + Send;

    /// `eth_estimateGas` for a contract creation.
    fn estimate_gas(
        &self,
        call: &CallRequest,
    ) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// `eth_sendRawTransaction`
    fn send_raw_transaction(
        &self,
        raw: &[u8],
    ) -> impl Future<Output = anyhow::Result<B256>> + Send;

    /// `eth_getTransactionReceipt`. `None` while the transaction is pending.
    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = anyhow::Result<Option<TransactionReceipt>>> + Send;

    /// `eth_blockNumber`
    fn block_number(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

/// [`ChainProvider`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcProvider {
    client: reqwest::Client,
    url: Url,
}

impl JsonRpcProvider {
    pub fn new(url: Url) -> anyhow::Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: Url, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client(timeout)?,
            url,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> anyhow::Result<T> {
        json_rpc_call(&self.client, &self.url, method, params).await
    }

    async fn call_quantity(&self, method: &str, params: Vec<Value>) -> anyhow::Result<U256> {
        self.call(method, params).await
    }
}

fn narrow<T: TryFrom<U256>>(value: U256, what: &str) -> anyhow::Result<T> {
    T::try_from(value).map_err(|_| anyhow::anyhow!("{what} {value} is out of range"))
}

impl ChainProvider for JsonRpcProvider {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let id = self.call_quantity("eth_chainId", vec![]).await?;
        narrow(id, "Chain id")
    }

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        let count = self
            .call_quantity(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        narrow(count, "Nonce")
    }

    async fn gas_price(&self) -> anyhow::Result<u128> {
        let price = self.call_quantity("eth_gasPrice", vec![]).await?;
        narrow(price, "Gas price")
    }

    async fn estimate_gas(&self, call: &CallRequest) -> anyhow::Result<u64> {
        let gas = self
            .call_quantity(
                "eth_estimateGas",
                vec![serde_json::json!({
                    "from": call.from,
                    "data": call.data,
                    "value": call.value,
                })],
            )
            .await?;
        narrow(gas, "Gas estimate")
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> anyhow::Result<B256> {
        self.call(
            "eth_sendRawTransaction",
            vec![Value::String(format!("0x{}", hex::encode(raw)))],
        )
        .await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> anyhow::Result<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        let number = self.call_quantity("eth_blockNumber", vec![]).await?;
        narrow(number, "Block number")
    }
}
