//! Wallet connection state and the JSON-RPC backed connector

use async_trait::async_trait;
use primitive_types::U256;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::rpc::{NodeAccountSigner, RpcClient};
use super::{TransactionSender, WalletConnector};
use crate::swap::tokens::{format_address, Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Disconnected,
    Connecting,
    Ready,
    /// Connected, but to a chain other than the required one
    Unsupported,
    Error,
}

/// What the engine is allowed to know about the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    pub status: WalletStatus,
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub native_balance: Option<U256>,
    pub error: Option<String>,
}

impl WalletSnapshot {
    pub fn disconnected() -> Self {
        Self {
            status: WalletStatus::Disconnected,
            address: None,
            chain_id: None,
            native_balance: None,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            status: WalletStatus::Error,
            error: Some(message.into()),
            ..Self::disconnected()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == WalletStatus::Ready
    }
}

impl Default for WalletSnapshot {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Wallet backed by an account the RPC node manages
pub struct RpcWallet {
    client: Arc<RpcClient>,
    required_chain_id: u64,
    preferred_account: Option<Address>,
    poll_interval: Duration,
    state: watch::Sender<WalletSnapshot>,
}

impl RpcWallet {
    pub fn new(
        client: Arc<RpcClient>,
        required_chain_id: u64,
        preferred_account: Option<Address>,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(WalletSnapshot::disconnected());
        Self {
            client,
            required_chain_id,
            preferred_account,
            poll_interval,
            state,
        }
    }

    async fn pick_account(&self) -> anyhow::Result<Address> {
        let accounts = self.client.accounts().await?;
        match self.preferred_account {
            Some(preferred) if accounts.contains(&preferred) => Ok(preferred),
            Some(preferred) => Err(anyhow::anyhow!(
                "Account {} is not available on the node",
                format_address(&preferred)
            )),
            None => accounts
                .first()
                .copied()
                .ok_or_else(|| anyhow::anyhow!("No accounts returned from wallet")),
        }
    }

    async fn hydrate(&self, account: Address) -> WalletSnapshot {
        let loaded = async {
            let chain_id = self.client.chain_id().await?;
            let balance = self.client.native_balance(&account).await?;
            anyhow::Ok((chain_id, balance))
        }
        .await;

        let snapshot = match loaded {
            Ok((chain_id, balance)) => {
                let status = if chain_id == self.required_chain_id {
                    WalletStatus::Ready
                } else {
                    WalletStatus::Unsupported
                };
                tracing::info!(
                    "Wallet {} on chain {} ({:?})",
                    format_address(&account),
                    chain_id,
                    status
                );
                WalletSnapshot {
                    status,
                    address: Some(account),
                    chain_id: Some(chain_id),
                    native_balance: Some(balance),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to load wallet {}: {}", format_address(&account), e);
                let previous = self.snapshot();
                WalletSnapshot {
                    status: WalletStatus::Error,
                    error: Some(e.to_string()),
                    ..previous
                }
            }
        };

        self.state.send_replace(snapshot.clone());
        snapshot
    }
}

#[async_trait]
impl WalletConnector for RpcWallet {
    fn snapshot(&self) -> WalletSnapshot {
        self.state.borrow().clone()
    }

    fn signer(&self) -> Option<Arc<dyn TransactionSender>> {
        let snapshot = self.state.borrow();
        let address = snapshot.address?;
        if snapshot.status == WalletStatus::Disconnected {
            return None;
        }
        Some(Arc::new(NodeAccountSigner::new(
            self.client.clone(),
            address,
            self.poll_interval,
        )))
    }

    async fn connect(&self) -> WalletSnapshot {
        self.state.send_modify(|s| {
            s.status = WalletStatus::Connecting;
            s.error = None;
        });

        match self.pick_account().await {
            Ok(account) => self.hydrate(account).await,
            Err(e) => {
                tracing::warn!("Wallet connection failed: {}", e);
                let snapshot = WalletSnapshot::failed(e.to_string());
                self.state.send_replace(snapshot.clone());
                snapshot
            }
        }
    }

    async fn disconnect(&self) {
        self.state.send_replace(WalletSnapshot::disconnected());
    }

    async fn refresh(&self) -> WalletSnapshot {
        let current = self.snapshot();
        match current.address {
            Some(account) => self.hydrate(account).await,
            None => current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::FakeNode;

    const FUJI: u64 = 43113;

    fn wallet_for(node: &FakeNode, preferred: Option<Address>) -> RpcWallet {
        let client = Arc::new(RpcClient::new(node.url()));
        RpcWallet::new(client, FUJI, preferred, Duration::from_millis(1))
    }

    #[test]
    fn test_disconnected_snapshot() {
        let snapshot = WalletSnapshot::default();
        assert_eq!(snapshot.status, WalletStatus::Disconnected);
        assert!(!snapshot.is_ready());
        assert!(snapshot.address.is_none());
    }

    #[test]
    fn test_failed_snapshot_keeps_message() {
        let snapshot = WalletSnapshot::failed("No accounts returned from wallet");
        assert_eq!(snapshot.status, WalletStatus::Error);
        assert_eq!(snapshot.error.as_deref(), Some("No accounts returned from wallet"));
    }

    #[tokio::test]
    async fn test_rpc_wallet_starts_disconnected_without_signer() {
        let client = Arc::new(RpcClient::new("http://127.0.0.1:1"));
        let wallet = RpcWallet::new(client, 43113, None, Duration::from_millis(10));
        assert_eq!(wallet.snapshot(), WalletSnapshot::disconnected());
        assert!(wallet.signer().is_none());
        // refresh without an account is a no-op
        assert_eq!(wallet.refresh().await, WalletSnapshot::disconnected());
    }

    #[tokio::test]
    async fn test_connect_on_required_chain_is_ready() {
        let account = Address::from_low_u64_be(0xaa);
        let node = FakeNode::start(FUJI, vec![account, Address::from_low_u64_be(0xbb)]).await;
        let wallet = wallet_for(&node, None);

        let snapshot = wallet.connect().await;
        assert_eq!(snapshot.status, WalletStatus::Ready);
        assert_eq!(snapshot.address, Some(account));
        assert_eq!(snapshot.chain_id, Some(FUJI));
        assert_eq!(snapshot.native_balance, Some(U256::exp10(18)));
        assert!(snapshot.error.is_none());
        assert_eq!(wallet.snapshot(), snapshot);
        assert_eq!(wallet.signer().unwrap().address(), account);

        wallet.disconnect().await;
        assert!(wallet.signer().is_none());
    }

    #[tokio::test]
    async fn test_connect_on_other_chain_is_unsupported() {
        let account = Address::from_low_u64_be(0xaa);
        let node = FakeNode::start(1, vec![account]).await;
        let wallet = wallet_for(&node, None);

        let snapshot = wallet.connect().await;
        assert_eq!(snapshot.status, WalletStatus::Unsupported);
        assert_eq!(snapshot.chain_id, Some(1));
        assert_eq!(snapshot.address, Some(account));
        assert!(!snapshot.is_ready());
    }

    #[tokio::test]
    async fn test_connect_errors_are_reported() {
        let account = Address::from_low_u64_be(0xaa);
        let node = FakeNode::start(FUJI, vec![account]).await;
        node.fail("eth_accounts", "wallet locked");
        let snapshot = wallet_for(&node, None).connect().await;
        assert_eq!(snapshot.status, WalletStatus::Error);
        assert!(snapshot.error.unwrap().contains("wallet locked"));
        assert!(snapshot.address.is_none());

        let empty = FakeNode::start(FUJI, vec![]).await;
        let snapshot = wallet_for(&empty, None).connect().await;
        assert_eq!(snapshot.status, WalletStatus::Error);
        assert_eq!(snapshot.error.as_deref(), Some("No accounts returned from wallet"));

        let missing = Address::from_low_u64_be(0xee);
        let snapshot = wallet_for(&empty, Some(missing)).connect().await;
        assert_eq!(snapshot.status, WalletStatus::Error);
        assert!(snapshot.error.unwrap().contains("not available on the node"));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_account() {
        let account = Address::from_low_u64_be(0xaa);
        let node = FakeNode::start(FUJI, vec![account]).await;
        let wallet = wallet_for(&node, Some(account));
        assert!(wallet.connect().await.is_ready());

        node.fail("eth_getBalance", "header not found");
        let snapshot = wallet.refresh().await;
        assert_eq!(snapshot.status, WalletStatus::Error);
        assert_eq!(snapshot.address, Some(account));
        assert!(snapshot.error.unwrap().contains("header not found"));
    }
}
