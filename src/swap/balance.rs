//! Input-token balance for the connected account

use primitive_types::U256;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::store::SwapStore;
use super::tokens::{Address, Token};
use super::units::format_units;
use crate::chain::{ChainReader, WalletSnapshot, WalletStatus};

/// Shown while the balance is unknown
pub const BALANCE_PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub token: Option<Token>,
    pub owner: Option<Address>,
    pub balance: Option<U256>,
    pub formatted: String,
    pub loading: bool,
    pub error: Option<String>,
}

impl BalanceSnapshot {
    fn unknown(token: Option<Token>) -> Self {
        Self {
            token,
            owner: None,
            balance: None,
            formatted: BALANCE_PLACEHOLDER.to_string(),
            loading: false,
            error: None,
        }
    }
}

fn connected_owner(wallet: &WalletSnapshot) -> Option<Address> {
    wallet
        .address
        .filter(|_| wallet.status != WalletStatus::Disconnected)
}

pub struct BalanceTracker {
    store: Arc<SwapStore>,
    reader: Arc<dyn ChainReader>,
    generation: AtomicU64,
    state: watch::Sender<BalanceSnapshot>,
}

impl BalanceTracker {
    pub fn new(store: Arc<SwapStore>, reader: Arc<dyn ChainReader>) -> Self {
        let (state, _) = watch::channel(BalanceSnapshot::unknown(None));
        Self {
            store,
            reader,
            generation: AtomicU64::new(0),
            state,
        }
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        self.state.borrow().clone()
    }

    /// Balance of the session's current input token for `wallet`'s
    /// account, if known
    pub fn balance(&self, wallet: &WalletSnapshot) -> Option<U256> {
        let token_in = self.store.snapshot().pair.token_in;
        let owner = connected_owner(wallet);
        let snapshot = self.state.borrow();
        let matches = snapshot.token.is_some()
            && snapshot.token == token_in
            && owner.is_some()
            && snapshot.owner == owner;
        if matches {
            snapshot.balance
        } else {
            None
        }
    }

    /// The whole balance as decimal text, for a "max" button
    pub fn max_amount(&self, wallet: &WalletSnapshot) -> Option<String> {
        let balance = self.balance(wallet)?;
        let token = self.store.snapshot().pair.token_in?;
        Some(format_units(balance, token.decimals()))
    }

    pub async fn refresh(&self, wallet: &WalletSnapshot) -> BalanceSnapshot {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.store.snapshot().pair.token_in;

        let owner = connected_owner(wallet);
        let queryable = token.clone().filter(Token::is_balance_queryable);
        let (Some(token), Some(owner)) = (queryable, owner) else {
            self.state.send_replace(BalanceSnapshot::unknown(token));
            return self.snapshot();
        };

        self.state.send_modify(|s| {
            s.token = Some(token.clone());
            s.owner = Some(owner);
            s.loading = true;
            s.error = None;
        });

        let result = self.reader.balance_of(token.address(), owner).await;

        let next = match result {
            Ok(balance) => {
                tracing::debug!("Balance of {}: {}", token.symbol(), balance);
                BalanceSnapshot {
                    token: Some(token.clone()),
                    owner: Some(owner),
                    balance: Some(balance),
                    formatted: format_units(balance, token.decimals()),
                    loading: false,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {} balance: {}", token.symbol(), e);
                BalanceSnapshot {
                    owner: Some(owner),
                    error: Some(e.to_string()),
                    ..BalanceSnapshot::unknown(Some(token.clone()))
                }
            }
        };

        if self.generation.load(Ordering::SeqCst) == ticket {
            self.state.send_replace(next);
        } else {
            tracing::debug!("Discarding stale balance for {}", token.symbol());
        }
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{HeldReads, MockChain};
    use crate::chain::TransactionSender;
    use crate::swap::session::{Pair, SwapAction};
    use crate::swap::tokens::TokenCatalog;

    fn wallet_for(chain: &MockChain) -> WalletSnapshot {
        WalletSnapshot {
            status: WalletStatus::Ready,
            address: Some(chain.address()),
            chain_id: Some(43113),
            native_balance: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_balance_and_max() {
        let catalog = TokenCatalog::default();
        let usdc = catalog.by_symbol("pUSDC").unwrap().clone();
        let avax = catalog.by_symbol("pAVAX").unwrap().clone();
        let chain = MockChain::new(Address::from_low_u64_be(0xaa));
        chain.set_balance(usdc.address(), U256::from(1_250_000u64));

        let store = Arc::new(SwapStore::new());
        store.dispatch(SwapAction::SetPair(Pair::new(usdc, avax)));
        let tracker = BalanceTracker::new(store.clone(), chain.clone());

        let snapshot = tracker.refresh(&wallet_for(&chain)).await;
        assert_eq!(snapshot.formatted, "1.25");
        let wallet = wallet_for(&chain);
        assert_eq!(tracker.balance(&wallet), Some(U256::from(1_250_000u64)));
        assert_eq!(tracker.max_amount(&wallet).as_deref(), Some("1.25"));

        // another account sees nothing until its own read
        let switched = WalletSnapshot {
            address: Some(Address::from_low_u64_be(0xbb)),
            ..wallet.clone()
        };
        assert_eq!(tracker.balance(&switched), None);
        assert!(tracker.max_amount(&switched).is_none());

        // flipping to the native placeholder token hides the stale balance
        store.dispatch(SwapAction::SetPair(Pair::new(
            catalog.by_symbol("pAVAX").unwrap().clone(),
            catalog.by_symbol("pUSDC").unwrap().clone(),
        )));
        assert_eq!(tracker.balance(&wallet), None);
        let snapshot = tracker.refresh(&wallet_for(&chain)).await;
        assert_eq!(snapshot.formatted, BALANCE_PLACEHOLDER);
        assert!(tracker.max_amount(&wallet).is_none());
    }

    #[tokio::test]
    async fn test_disconnected_or_failing_reads() {
        let usdc = TokenCatalog::default().by_symbol("pUSDC").unwrap().clone();
        let chain = MockChain::new(Address::from_low_u64_be(0xaa));
        let store = Arc::new(SwapStore::new());
        store.dispatch(SwapAction::SetPair(Pair {
            token_in: Some(usdc),
            token_out: None,
        }));
        let tracker = BalanceTracker::new(store, chain.clone());

        let snapshot = tracker.refresh(&WalletSnapshot::disconnected()).await;
        assert_eq!(snapshot.formatted, BALANCE_PLACEHOLDER);
        assert_eq!(chain.reads(), 0);

        chain.fail_reads(true);
        let snapshot = tracker.refresh(&wallet_for(&chain)).await;
        assert_eq!(snapshot.formatted, BALANCE_PLACEHOLDER);
        assert_eq!(snapshot.error.as_deref(), Some("rpc unavailable"));
        assert!(tracker.balance(&wallet_for(&chain)).is_none());
    }

    #[tokio::test]
    async fn test_late_balance_read_is_discarded() {
        let (reader, mut reads) = HeldReads::new();
        let usdc = TokenCatalog::default().by_symbol("pUSDC").unwrap().clone();
        let avax = TokenCatalog::default().by_symbol("pAVAX").unwrap().clone();
        let store = Arc::new(SwapStore::new());
        store.dispatch(SwapAction::SetPair(Pair::new(usdc.clone(), avax)));
        let tracker = Arc::new(BalanceTracker::new(store, reader));
        let wallet = WalletSnapshot {
            status: WalletStatus::Ready,
            address: Some(Address::from_low_u64_be(0xaa)),
            chain_id: Some(43113),
            native_balance: None,
            error: None,
        };

        let first = tokio::spawn({
            let (tracker, wallet) = (tracker.clone(), wallet.clone());
            async move { tracker.refresh(&wallet).await }
        });
        let (token, respond_first) = reads.recv().await.unwrap();
        assert_eq!(token, usdc.address());

        let second = tokio::spawn({
            let (tracker, wallet) = (tracker.clone(), wallet.clone());
            async move { tracker.refresh(&wallet).await }
        });
        let (_, respond_second) = reads.recv().await.unwrap();

        respond_second.send(U256::from(2_000_000u64)).unwrap();
        assert_eq!(second.await.unwrap().formatted, "2.0");

        respond_first.send(U256::from(1u64)).unwrap();
        first.await.unwrap();
        assert_eq!(tracker.balance(&wallet), Some(U256::from(2_000_000u64)));
        assert_eq!(tracker.snapshot().formatted, "2.0");
        assert!(!tracker.snapshot().loading);
    }
}
