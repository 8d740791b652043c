//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Read calls are retried this many times before giving up.
const READ_RETRIES: usize = 3;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
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
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// [`json_rpc_call`] retried with exponential backoff.
///
/// Only for reads: a retried write could be submitted twice.
pub async fn json_rpc_read<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    (|| json_rpc_call(client, url, method, params.clone()))
        .retry(ExponentialBuilder::default().with_max_times(READ_RETRIES))
        .notify(|err, after| {
            tracing::debug!(error = %err, method, ?after, "RPC read failed, retrying...");
        })
        .await
}

/// Deployed bytecode at `address`; empty when nothing is deployed.
pub async fn get_code(
    client: &reqwest::Client,
    url: &str,
    address: Address,
) -> Result<Bytes, anyhow::Error> {
    json_rpc_read(
        client,
        url,
        "eth_getCode",
        vec![serde_json::json!(address), serde_json::json!("latest")],
    )
    .await
}

/// `eth_call` against the latest block.
pub async fn eth_call(
    client: &reqwest::Client,
    url: &str,
    to: Address,
    data: &Bytes,
) -> Result<Bytes, anyhow::Error> {
    json_rpc_read(
        client,
        url,
        "eth_call",
        vec![
            serde_json::json!({ "to": to, "data": data }),
            serde_json::json!("latest"),
        ],
    )
    .await
}

/// Chain id reported by the node.
pub async fn chain_id(client: &reqwest::Client, url: &str) -> Result<u64, anyhow::Error> {
    let hex: String = json_rpc_read(client, url, "eth_chainId", vec![]).await?;
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid chain id: {hex}"))
}

/// The fields of a transaction receipt this crate looks at.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    /// `0x1` on success.
    pub status: Option<String>,
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }
}

/// Send a transaction from a node-managed account and wait for it to be mined.
///
/// Fails if the transaction reverts or no receipt appears within `timeout_secs`.
pub async fn send_transaction(
    client: &reqwest::Client,
    url: &str,
    from: Address,
    to: Address,
    data: &Bytes,
    timeout_secs: u64,
) -> Result<TransactionReceipt, anyhow::Error> {
    let tx_hash: B256 = json_rpc_call(
        client,
        url,
        "eth_sendTransaction",
        vec![serde_json::json!({
            "from": from,
            "to": to,
            "data": data,
        })],
    )
    .await
    .context("Failed to send transaction")?;

    tracing::debug!(%tx_hash, %to, "Transaction sent");

    let receipt = wait_for_receipt(client, url, tx_hash, timeout_secs).await?;
    if !receipt.succeeded() {
        anyhow::bail!("Transaction {tx_hash} reverted");
    }
    Ok(receipt)
}

/// Poll `eth_getTransactionReceipt` until the transaction is mined.
pub async fn wait_for_receipt(
    client: &reqwest::Client,
    url: &str,
    tx_hash: B256,
    timeout_secs: u64,
) -> Result<TransactionReceipt, anyhow::Error> {
    wait_until_ready(&format!("receipt of {tx_hash}"), timeout_secs, move || async move {
        let found: Option<TransactionReceipt> = json_rpc_call(
            client,
            url,
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await?;
        found.context("Transaction not mined yet")
    })
    .await
}

/// Wait until `check_fn` succeeds, returning its value.
///
/// # Arguments
/// * `name` - What is being waited on (for error messages)
/// * `timeout_secs` - Maximum time to wait in seconds
/// * `check_fn` - Function that returns Ok when the condition holds
pub async fn wait_until_ready<T, F, Fut>(
    name: &str,
    timeout_secs: u64,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let max_duration = Duration::from_secs(timeout_secs);

    loop {
        if start.elapsed() > max_duration {
            anyhow::bail!("Timeout waiting for {}", name);
        }

        match check_fn().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::trace!(error = %e, waiting_on = %name, "Check failed, retrying...");
            }
        }

        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }
}
