//! On-chain collaborators
//!
//! The swap engine only sees these traits:
//! - `ChainReader` for reserve, allowance and balance reads
//! - `TransactionSender` for the wallet's signing capability
//! - `WalletConnector` for connection status and the signer
//!
//! `rpc` and `wallet` provide JSON-RPC backed implementations.

use async_trait::async_trait;
use primitive_types::{H256, U256};
use std::sync::Arc;

pub mod abi;
#[cfg(test)]
pub(crate) mod mock;
pub mod rpc;
pub mod wallet;

pub use wallet::{RpcWallet, WalletSnapshot, WalletStatus};

use crate::swap::tokens::Address;

/// Read-only contract calls
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `(reserveA, reserveB)` of the pool, ordered like the arguments
    async fn get_reserves(
        &self,
        amm: Address,
        token_a: Address,
        token_b: Address,
    ) -> anyhow::Result<(U256, U256)>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> anyhow::Result<U256>;

    async fn balance_of(&self, token: Address, owner: Address) -> anyhow::Result<U256>;
}

/// Outcome of waiting on a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    /// Hash reported by the receipt, if the receipt carried one
    pub hash: Option<H256>,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Signing capability exposed by a connected wallet
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Account that signs and pays
    fn address(&self) -> Address;

    /// Sign and broadcast a call; returns the submission hash
    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> anyhow::Result<H256>;

    /// Block until the transaction is mined. No internal deadline.
    async fn wait_for_confirmation(&self, hash: H256) -> anyhow::Result<TxConfirmation>;
}

/// Wallet connection as seen by the engine
#[async_trait]
pub trait WalletConnector: Send + Sync {
    fn snapshot(&self) -> WalletSnapshot;

    /// Present only while connected
    fn signer(&self) -> Option<Arc<dyn TransactionSender>>;

    /// Failures are retained in the returned snapshot's `error`
    async fn connect(&self) -> WalletSnapshot;

    async fn disconnect(&self);

    async fn refresh(&self) -> WalletSnapshot;
}

/// `0x`-prefixed lowercase hex of a 32-byte hash
pub fn format_hash(hash: &H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}
