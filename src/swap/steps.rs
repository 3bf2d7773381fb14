//! Step flow controller
//!
//! Gates movement between the four flow states. Every transition evaluates
//! its gate against the session as it is at commit time (inside
//! `SwapStore::dispatch_if`), so a concurrent edit cannot slip past a check.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use super::error::{SwapError, SwapResult};
use super::session::{FlowState, SwapAction, SwapSession};
use super::store::SwapStore;
use crate::chain::{WalletSnapshot, WalletStatus};

/// How direct tab selection treats forward jumps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabPolicy {
    /// Only earlier steps (and a finished receipt) are selectable
    #[default]
    BackwardOnly,
    /// Forward jumps allowed when every gate in between passes
    Gated,
}

#[derive(Debug, Clone)]
pub struct StepFlowController {
    required_chain_id: u64,
    policy: TabPolicy,
}

impl StepFlowController {
    pub fn new(required_chain_id: u64, policy: TabPolicy) -> Self {
        Self {
            required_chain_id,
            policy,
        }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    pub fn policy(&self) -> TabPolicy {
        self.policy
    }

    /// connect -> configure
    pub fn check_connect(&self, wallet: &WalletSnapshot) -> SwapResult<()> {
        let wrong_chain = wallet
            .chain_id
            .map_or(false, |id| id != self.required_chain_id);
        if wallet.status == WalletStatus::Unsupported || (wallet.is_ready() && wrong_chain) {
            return Err(SwapError::NetworkMismatch {
                expected: self.required_chain_id,
                actual: wallet.chain_id.unwrap_or_default(),
            });
        }
        if !wallet.is_ready() || wallet.chain_id.is_none() {
            let reason = wallet
                .error
                .clone()
                .unwrap_or_else(|| "wallet not connected".to_string());
            return Err(SwapError::Connection(reason));
        }
        Ok(())
    }

    /// configure -> review. Returns the parsed input amount.
    pub fn check_configure(
        &self,
        session: &SwapSession,
        balance: Option<U256>,
    ) -> SwapResult<U256> {
        let (token_in, token_out) = session.pair.both().ok_or(SwapError::PairIncomplete)?;
        if token_in == token_out {
            return Err(SwapError::IdenticalTokens);
        }

        let amount = session.amount_in_wei()?;
        if amount.is_zero() {
            return Err(SwapError::AmountParse("amount must be greater than zero".into()));
        }

        // no balance data means the check is skipped
        if let Some(available) = balance {
            if amount > available {
                return Err(SwapError::InsufficientBalance {
                    required: amount,
                    available,
                });
            }
        }
        Ok(amount)
    }

    /// Whether the session may move to the next step manually
    pub fn can_advance(
        &self,
        session: &SwapSession,
        wallet: &WalletSnapshot,
        balance: Option<U256>,
    ) -> SwapResult<()> {
        self.gate(session.step, session, wallet, balance)
    }

    fn gate(
        &self,
        from: FlowState,
        session: &SwapSession,
        wallet: &WalletSnapshot,
        balance: Option<U256>,
    ) -> SwapResult<()> {
        match from {
            FlowState::Connect => self.check_connect(wallet),
            FlowState::Configure => self.check_configure(session, balance).map(|_| ()),
            FlowState::Review => Err(SwapError::StepLocked {
                step: FlowState::Review,
                reason: "confirmation follows a successful swap".into(),
            }),
            FlowState::Confirmed => Err(SwapError::StepLocked {
                step: FlowState::Confirmed,
                reason: "already at the final step".into(),
            }),
        }
    }

    /// Move forward one step if the current gate passes
    pub fn advance(
        &self,
        store: &SwapStore,
        wallet: &WalletSnapshot,
        balance: Option<U256>,
    ) -> SwapResult<FlowState> {
        let mut verdict = Ok(());
        store.dispatch_if(
            |session| {
                verdict = self.can_advance(session, wallet, balance);
                verdict.is_ok()
            },
            [SwapAction::NextStep],
        );
        verdict?;
        Ok(store.snapshot().step)
    }

    /// Move back one step; only `connect` has nowhere to go
    pub fn back(&self, store: &SwapStore) -> SwapResult<FlowState> {
        let from = store.snapshot().step;
        if from == FlowState::Connect {
            return Err(SwapError::StepLocked {
                step: FlowState::Connect,
                reason: "no earlier step".into(),
            });
        }
        let target = from.previous();
        if !store.dispatch_if(|session| session.step == from, [SwapAction::SetStep(target)]) {
            return Err(SwapError::StepLocked {
                step: from,
                reason: "step changed while navigating".into(),
            });
        }
        Ok(target)
    }

    /// Direct tab selection
    pub fn select(
        &self,
        store: &SwapStore,
        target: FlowState,
        wallet: &WalletSnapshot,
        balance: Option<U256>,
    ) -> SwapResult<FlowState> {
        let mut verdict = Ok(());
        store.dispatch_if(
            |session| {
                verdict = self.can_select(session, target, wallet, balance);
                verdict.is_ok()
            },
            [SwapAction::SetStep(target)],
        );
        verdict?;
        Ok(target)
    }

    /// Whether direct selection of `target` is allowed right now
    pub fn can_select(
        &self,
        session: &SwapSession,
        target: FlowState,
        wallet: &WalletSnapshot,
        balance: Option<U256>,
    ) -> SwapResult<()> {
        let current = session.step;
        if target <= current {
            return Ok(());
        }
        if target == FlowState::Confirmed && session.last_tx.is_some() {
            return Ok(());
        }

        match self.policy {
            TabPolicy::BackwardOnly => Err(SwapError::StepLocked {
                step: current,
                reason: format!("cannot jump ahead to {}", target),
            }),
            TabPolicy::Gated => FlowState::ORDER[current.index()..target.index()]
                .iter()
                .try_for_each(|&step| self.gate(step, session, wallet, balance)),
        }
    }
}
