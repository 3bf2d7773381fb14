//! Ethereum JSON-RPC client
//!
//! Covers the handful of methods the swap flow needs: `eth_call` for contract
//! reads, account/chain/balance lookups for the wallet, and
//! `eth_sendTransaction` + receipt polling for node-managed accounts.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use primitive_types::{H256, U256};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{abi, format_hash, ChainReader, TransactionSender, TxConfirmation};
use crate::swap::tokens::{format_address, Address};

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

/// Subset of a transaction receipt
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
}

impl RpcReceipt {
    fn into_confirmation(self) -> Result<TxConfirmation> {
        // pre-Byzantium receipts have no status; treat them as success
        let success = match self.status.as_deref() {
            Some(status) => !parse_quantity(status)?.is_zero(),
            None => true,
        };
        let block_number = self.block_number.as_deref().map(parse_u64).transpose()?;
        Ok(TxConfirmation {
            hash: self.transaction_hash,
            success,
            block_number,
        })
    }
}

/// Parse a hex quantity such as `0x1a` (empty digits mean zero)
pub fn parse_quantity(text: &str) -> Result<U256> {
    let digits = text.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|e| anyhow!("Invalid quantity {}: {:?}", text, e))
}

pub fn parse_u64(text: &str) -> Result<u64> {
    let digits = text.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid quantity {}", text))
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn parse_data(text: &str) -> Result<Vec<u8>> {
    hex::decode(text.trim_start_matches("0x"))
        .with_context(|| format!("Invalid hex data {}", text))
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn raw_request(&self, method: &str, params: Value) -> Result<Option<Value>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<Value> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", method, self.url))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{} returned malformed JSON", method))?;

        if let Some(err) = response.error {
            return Err(anyhow!("{} failed ({}): {}", method, err.code, err.message));
        }
        Ok(response.result.filter(|value| !value.is_null()))
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self
            .raw_request(method, params)
            .await?
            .ok_or_else(|| anyhow!("{} returned no result", method))?;
        serde_json::from_value(value)
            .with_context(|| format!("{} returned an unexpected result", method))
    }

    /// Like `request`, but a `null` result is a valid answer
    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>> {
        self.raw_request(method, params)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .with_context(|| format!("{} returned an unexpected result", method))
    }

    /// `eth_call` against the latest block
    pub async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>> {
        let result: String = self
            .request(
                "eth_call",
                json!([{ "to": format_address(to), "data": hex_data(data) }, "latest"]),
            )
            .await?;
        parse_data(&result)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let result: String = self.request("eth_chainId", json!([])).await?;
        parse_u64(&result)
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request("eth_accounts", json!([])).await
    }

    pub async fn native_balance(&self, account: &Address) -> Result<U256> {
        let result: String = self
            .request(
                "eth_getBalance",
                json!([format_address(account), "latest"]),
            )
            .await?;
        parse_quantity(&result)
    }

    /// Submit a transaction from an account the node manages
    pub async fn send_transaction(
        &self,
        from: &Address,
        to: &Address,
        data: &[u8],
    ) -> Result<H256> {
        self.request(
            "eth_sendTransaction",
            json!([{
                "from": format_address(from),
                "to": format_address(to),
                "data": hex_data(data),
            }]),
        )
        .await
    }

    pub async fn transaction_receipt(&self, hash: &H256) -> Result<Option<RpcReceipt>> {
        self.request_optional(
            "eth_getTransactionReceipt",
            json!([format_hash(hash)]),
        )
        .await
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn get_reserves(
        &self,
        amm: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<(U256, U256)> {
        let data = self
            .call(&amm, &abi::get_reserves_call(&token_a, &token_b))
            .await?;
        abi::decode_reserves(&data)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let data = self
            .call(&token, &abi::allowance_call(&owner, &spender))
            .await?;
        abi::decode_uint(&data, 0)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let data = self.call(&token, &abi::balance_of_call(&owner)).await?;
        abi::decode_uint(&data, 0)
    }
}

/// Signer for an account unlocked on the node (dev nodes, managed signers)
pub struct NodeAccountSigner {
    client: Arc<RpcClient>,
    from: Address,
    poll_interval: Duration,
}

impl NodeAccountSigner {
    pub fn new(client: Arc<RpcClient>, from: Address, poll_interval: Duration) -> Self {
        Self {
            client,
            from,
            poll_interval,
        }
    }
}

#[async_trait]
impl TransactionSender for NodeAccountSigner {
    fn address(&self) -> Address {
        self.from
    }

    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<H256> {
        let hash = self.client.send_transaction(&self.from, &to, &data).await?;
        tracing::info!(
            "Submitted transaction {} to {}",
            format_hash(&hash),
            format_address(&to)
        );
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: H256) -> Result<TxConfirmation> {
        loop {
            if let Some(receipt) = self.client.transaction_receipt(&hash).await? {
                let confirmation = receipt.into_confirmation()?;
                tracing::info!(
                    "Transaction {} mined in block {:?} (success={})",
                    format_hash(&hash),
                    confirmation.block_number,
                    confirmation.success
                );
                return Ok(confirmation);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{fake_tx_hash, FakeNode};

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::zero());
        assert_eq!(parse_quantity("0x").unwrap(), U256::zero());
        assert_eq!(parse_quantity("0x1a").unwrap(), U256::from(26u64));
        assert!(parse_quantity("0xzz").is_err());
        assert_eq!(parse_u64("0xa869").unwrap(), 43113);
    }

    #[test]
    fn test_receipt_status() {
        let ok: RpcReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "status": "0x1",
            "blockNumber": "0x10"
        }))
        .unwrap();
        let confirmation = ok.into_confirmation().unwrap();
        assert!(confirmation.success);
        assert_eq!(confirmation.block_number, Some(16));
        assert_eq!(confirmation.hash, Some(H256::repeat_byte(0x11)));

        let reverted: RpcReceipt = serde_json::from_value(json!({ "status": "0x0" })).unwrap();
        let confirmation = reverted.into_confirmation().unwrap();
        assert!(!confirmation.success);
        assert!(confirmation.hash.is_none());
    }

    #[test]
    fn test_rpc_error_body() {
        let response: RpcResponse<String> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "execution reverted" }
        }))
        .unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().message, "execution reverted");
    }

    #[tokio::test]
    async fn test_node_error_carries_message() {
        let node = FakeNode::start(43113, vec![]).await;
        node.fail("eth_call", "execution reverted: pool not found");
        let client = RpcClient::new(node.url());
        let amm = Address::from_low_u64_be(0xcc);

        let err = client.call(&amm, &[0x01]).await.unwrap_err();
        assert!(err.to_string().contains("eth_call failed (-32000)"));
        assert!(err.to_string().contains("execution reverted: pool not found"));

        let err = client
            .get_reserves(amm, Address::from_low_u64_be(1), Address::from_low_u64_be(2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pool not found"));

        // untouched methods still answer
        assert_eq!(client.chain_id().await.unwrap(), 43113);
    }

    #[tokio::test]
    async fn test_null_receipt_keeps_polling() {
        let from = Address::from_low_u64_be(0xaa);
        let node = FakeNode::start(43113, vec![from]).await;
        node.hold_receipt(2);
        let client = Arc::new(RpcClient::new(node.url()));
        let signer = NodeAccountSigner::new(client, from, Duration::from_millis(1));

        let hash = signer
            .send_transaction(Address::from_low_u64_be(0xcc), vec![0x01, 0x02])
            .await
            .unwrap();
        assert_eq!(hash, fake_tx_hash());

        let confirmation = signer.wait_for_confirmation(hash).await.unwrap();
        assert_eq!(node.receipt_polls(), 3);
        assert!(confirmation.success);
        assert_eq!(confirmation.block_number, Some(42));
        assert_eq!(confirmation.hash, Some(fake_tx_hash()));
    }
}
