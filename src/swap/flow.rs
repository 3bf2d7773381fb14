//! Swap flow context and session registry
//!
//! `SwapFlow` owns one session's store and the components that derive from
//! it, and exposes the user intents. Every intent that changes the pair or
//! the amount re-runs the quote, allowance and balance derivations.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::allowance::{AllowanceManager, AllowanceSnapshot};
use super::balance::{BalanceSnapshot, BalanceTracker};
use super::error::{SwapError, SwapResult};
use super::quote::{QuoteEngine, QuoteOutcome, QuoteState, DEFAULT_SLIPPAGE_BPS};
use super::session::{Amounts, FlowState, Pair, SwapAction, SwapSession, TransactionReceipt};
use super::steps::{StepFlowController, TabPolicy};
use super::store::SwapStore;
use super::submitter::{SubmitState, TransactionSubmitter};
use super::tokens::{Address, Token, TokenCatalog};
use crate::chain::{ChainReader, WalletConnector, WalletSnapshot};

/// Avalanche Fuji
pub const DEFAULT_CHAIN_ID: u64 = 43113;

/// Per-flow settings shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    /// AMM contract; also the allowance spender
    pub amm: Option<Address>,
    pub required_chain_id: u64,
    pub slippage_bps: u32,
    pub tab_policy: TabPolicy,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            amm: None,
            required_chain_id: DEFAULT_CHAIN_ID,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            tab_policy: TabPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub id: FlowState,
    pub label: &'static str,
    pub description: &'static str,
    pub active: bool,
    pub selectable: bool,
}

/// Everything a client needs to render the flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowView {
    pub session: SwapSession,
    pub wallet: WalletSnapshot,
    pub steps: Vec<StepView>,
    pub can_advance: bool,
    pub advance_blocker: Option<String>,
    pub can_go_back: bool,
    pub quote: QuoteState,
    pub allowance: AllowanceSnapshot,
    pub balance: BalanceSnapshot,
    pub swap: SubmitState,
}

pub struct SwapFlow {
    catalog: Arc<TokenCatalog>,
    store: Arc<SwapStore>,
    wallet: Arc<dyn WalletConnector>,
    steps: StepFlowController,
    quote: QuoteEngine,
    allowance: AllowanceManager,
    balance: BalanceTracker,
    submitter: TransactionSubmitter,
}

impl SwapFlow {
    pub fn new(
        settings: &FlowSettings,
        catalog: Arc<TokenCatalog>,
        reader: Arc<dyn ChainReader>,
        wallet: Arc<dyn WalletConnector>,
    ) -> Self {
        let store = Arc::new(SwapStore::new());
        Self {
            catalog,
            steps: StepFlowController::new(settings.required_chain_id, settings.tab_policy),
            quote: QuoteEngine::new(
                store.clone(),
                reader.clone(),
                settings.amm,
                settings.slippage_bps,
            ),
            allowance: AllowanceManager::new(store.clone(), reader.clone(), settings.amm),
            balance: BalanceTracker::new(store.clone(), reader),
            submitter: TransactionSubmitter::new(store.clone(), settings.amm),
            wallet,
            store,
        }
    }

    pub fn store(&self) -> &Arc<SwapStore> {
        &self.store
    }

    pub fn session(&self) -> SwapSession {
        self.store.snapshot()
    }

    pub fn catalog(&self) -> &TokenCatalog {
        &self.catalog
    }

    pub fn view(&self) -> FlowView {
        let session = self.store.snapshot();
        let wallet = self.wallet.snapshot();
        let balance = self.balance.balance(&wallet);

        let blocker = self.steps.can_advance(&session, &wallet, balance).err();
        let steps = FlowState::ORDER
            .iter()
            .map(|&step| StepView {
                id: step,
                label: step.label(),
                description: step.description(),
                active: step == session.step,
                selectable: self.steps.can_select(&session, step, &wallet, balance).is_ok(),
            })
            .collect();

        FlowView {
            can_advance: blocker.is_none(),
            advance_blocker: blocker.map(|e| e.to_string()),
            can_go_back: session.step != FlowState::Connect,
            steps,
            quote: self.quote.state(),
            allowance: self.allowance.snapshot(&wallet),
            balance: self.balance.snapshot(),
            swap: self.submitter.state(),
            wallet,
            session,
        }
    }

    /// Re-run every derivation against the current session
    pub async fn rederive(&self) {
        let wallet = self.wallet.snapshot();
        tokio::join!(
            self.quote.refresh(),
            self.allowance.refresh(&wallet),
            self.balance.refresh(&wallet),
        );
    }

    pub async fn connect_wallet(&self) -> WalletSnapshot {
        let snapshot = self.wallet.connect().await;
        self.rederive().await;
        snapshot
    }

    pub async fn disconnect_wallet(&self) {
        self.wallet.disconnect().await;
        self.rederive().await;
    }

    pub async fn refresh_wallet(&self) -> WalletSnapshot {
        let snapshot = self.wallet.refresh().await;
        self.rederive().await;
        snapshot
    }

    pub async fn next_step(&self) -> SwapResult<FlowState> {
        let wallet = self.wallet.snapshot();
        let balance = self.balance.balance(&wallet);
        let step = self.steps.advance(&self.store, &wallet, balance)?;
        self.entered(step).await;
        Ok(step)
    }

    pub fn back_step(&self) -> SwapResult<FlowState> {
        self.steps.back(&self.store)
    }

    pub async fn select_step(&self, target: FlowState) -> SwapResult<FlowState> {
        let wallet = self.wallet.snapshot();
        let balance = self.balance.balance(&wallet);
        let step = self.steps.select(&self.store, target, &wallet, balance)?;
        self.entered(step).await;
        Ok(step)
    }

    /// From the receipt back to configure, keeping the pair and receipt
    pub async fn start_new_swap(&self) -> SwapResult<FlowState> {
        let applied = self.store.dispatch_if(
            |s| s.step == FlowState::Confirmed,
            [SwapAction::SetStep(FlowState::Configure)],
        );
        if !applied {
            return Err(SwapError::StepLocked {
                step: self.store.snapshot().step,
                reason: "no finished swap to start over from".into(),
            });
        }
        self.submitter.reset();
        self.entered(FlowState::Configure).await;
        Ok(FlowState::Configure)
    }

    async fn entered(&self, step: FlowState) {
        if step != FlowState::Configure {
            return;
        }
        if let (Some(token_in), Some(token_out)) = self.catalog.default_pair() {
            self.store.dispatch_if(
                |s| s.pair == Pair::default(),
                [SwapAction::SetPair(Pair::new(token_in, token_out))],
            );
        }
        self.rederive().await;
    }

    pub async fn select_token_in(&self, token: &str) -> SwapResult<Pair> {
        let token = self.catalog.resolve(token)?;
        self.choose(Side::In, token).await
    }

    pub async fn select_token_out(&self, token: &str) -> SwapResult<Pair> {
        let token = self.catalog.resolve(token)?;
        self.choose(Side::Out, token).await
    }

    /// Put `token` on `side`. Choosing the token that sits on the other side
    /// swaps the two instead of producing an identical pair.
    async fn choose(&self, side: Side, token: Token) -> SwapResult<Pair> {
        loop {
            let current = self.store.snapshot().pair;
            let (own, other) = match side {
                Side::In => (&current.token_in, &current.token_out),
                Side::Out => (&current.token_out, &current.token_in),
            };

            let displaced = if other.as_ref() == Some(&token) {
                let replacement = own
                    .clone()
                    .filter(|t| t != &token)
                    .or_else(|| self.catalog.all().iter().find(|t| **t != token).cloned())
                    .ok_or(SwapError::IdenticalTokens)?;
                Some(replacement)
            } else {
                None
            };

            let update = match side {
                Side::In => Pair {
                    token_in: Some(token.clone()),
                    token_out: displaced,
                },
                Side::Out => Pair {
                    token_in: displaced,
                    token_out: Some(token.clone()),
                },
            };

            if self
                .store
                .dispatch_if(|s| s.pair == current, [SwapAction::SetPair(update)])
            {
                break;
            }
        }

        self.rederive().await;
        Ok(self.store.snapshot().pair)
    }

    pub async fn flip_pair(&self) -> SwapResult<Pair> {
        let current = self.store.snapshot().pair;
        let (token_in, token_out) = current.both().ok_or(SwapError::PairIncomplete)?;
        let flipped = Pair::new(token_out.clone(), token_in.clone());
        self.store
            .dispatch_if(|s| s.pair == current, [SwapAction::SetPair(flipped)]);
        self.rederive().await;
        Ok(self.store.snapshot().pair)
    }

    /// Store the raw amount text; validity is judged by the gates
    pub async fn set_amount(&self, text: &str) {
        self.store
            .dispatch(SwapAction::SetAmounts(Amounts::input(text)));
        self.rederive().await;
    }

    pub async fn use_max_amount(&self) -> SwapResult<String> {
        let max = self
            .balance
            .max_amount(&self.wallet.snapshot())
            .ok_or_else(|| {
                SwapError::BalanceUnavailable("input token balance is not known".into())
            })?;
        self.set_amount(&max).await;
        Ok(max)
    }

    pub fn set_privacy(&self, enabled: bool) {
        self.store.dispatch(SwapAction::TogglePrivacy(enabled));
    }

    pub async fn refresh_quote(&self) -> QuoteOutcome {
        self.quote.refresh().await
    }

    pub async fn refresh_allowance(&self) -> AllowanceSnapshot {
        self.allowance.refresh(&self.wallet.snapshot()).await
    }

    pub async fn approve(&self) -> SwapResult<String> {
        let wallet = self.wallet.snapshot();
        self.allowance.approve(&wallet, self.wallet.signer()).await
    }

    /// Submit the reviewed swap; only possible from the review step
    pub async fn swap(&self) -> SwapResult<TransactionReceipt> {
        if self.store.snapshot().step != FlowState::Review {
            return Err(SwapError::PrerequisitesMissing(
                "swaps are submitted from the review step".into(),
            ));
        }
        let allowance = self.allowance.snapshot(&self.wallet.snapshot());
        self.submitter.submit(self.wallet.signer(), &allowance).await
    }

    pub fn clear_last_tx(&self) {
        self.store.dispatch(SwapAction::ClearLastTx);
    }

    pub async fn reset(&self) {
        self.store.dispatch(SwapAction::Reset);
        self.submitter.reset();
        self.rederive().await;
    }
}

/// Builds the wallet for a new session
pub type WalletFactory = Box<dyn Fn() -> Arc<dyn WalletConnector> + Send + Sync>;

/// Registry of live swap flows, keyed by session id
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SwapFlow>>>,
    settings: FlowSettings,
    catalog: Arc<TokenCatalog>,
    reader: Arc<dyn ChainReader>,
    wallet_factory: WalletFactory,
}

impl SessionManager {
    pub fn new(
        settings: FlowSettings,
        catalog: Arc<TokenCatalog>,
        reader: Arc<dyn ChainReader>,
        wallet_factory: WalletFactory,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
            catalog,
            reader,
            wallet_factory,
        }
    }

    pub fn catalog(&self) -> &Arc<TokenCatalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Start a new flow and return its id
    pub async fn create_session(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let flow = SwapFlow::new(
            &self.settings,
            self.catalog.clone(),
            self.reader.clone(),
            (self.wallet_factory)(),
        );

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::new(flow));
        tracing::info!("Created swap session {} ({} active)", session_id, sessions.len());
        session_id
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<SwapFlow>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    pub async fn remove_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }
}
