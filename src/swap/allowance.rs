//! Allowance manager
//!
//! Tracks how much of the input token the swap contract may spend for the
//! connected account, and submits exact-amount approvals.

use primitive_types::U256;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::error::{SwapError, SwapResult};
use super::session::SwapSession;
use super::store::SwapStore;
use super::tokens::{format_address, Address, Token};
use crate::chain::{
    abi, format_hash, ChainReader, TransactionSender, WalletSnapshot, WalletStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    Idle,
    Checking,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Idle,
    Waiting,
    Success,
    Error,
}

/// Approval is required for a positive amount unless the allowance is
/// known and covers it.
pub fn needs_approval(allowance: Option<U256>, amount: Option<U256>) -> bool {
    let Some(amount) = amount.filter(|a| !a.is_zero()) else {
        return false;
    };
    match allowance {
        None => true,
        Some(allowance) => allowance.is_zero() || allowance < amount,
    }
}

/// The (token, owner, amount) an allowance read is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceInputs {
    pub token: Token,
    pub owner: Address,
    pub amount: U256,
}

impl AllowanceInputs {
    pub fn resolve(session: &SwapSession, wallet: &WalletSnapshot) -> Option<Self> {
        if wallet.status == WalletStatus::Disconnected {
            return None;
        }
        Some(Self {
            token: session.pair.token_in.clone()?,
            owner: wallet.address?,
            amount: session.positive_amount_in_wei()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AllowanceState {
    inputs: Option<AllowanceInputs>,
    allowance: Option<U256>,
    read_status: ReadStatus,
    write_status: WriteStatus,
    error: Option<String>,
    last_approval: Option<String>,
}

impl Default for AllowanceState {
    fn default() -> Self {
        Self {
            inputs: None,
            allowance: None,
            read_status: ReadStatus::Idle,
            write_status: WriteStatus::Idle,
            error: None,
            last_approval: None,
        }
    }
}

/// Read model. `needs_approval` is derived from `allowance` and the
/// session's current amount every time a snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowanceSnapshot {
    pub allowance: Option<U256>,
    pub needs_approval: bool,
    pub read_status: ReadStatus,
    pub write_status: WriteStatus,
    pub error: Option<String>,
    pub last_approval: Option<String>,
}

pub struct AllowanceManager {
    store: Arc<SwapStore>,
    reader: Arc<dyn ChainReader>,
    spender: Option<Address>,
    generation: AtomicU64,
    state: watch::Sender<AllowanceState>,
}

impl AllowanceManager {
    pub fn new(
        store: Arc<SwapStore>,
        reader: Arc<dyn ChainReader>,
        spender: Option<Address>,
    ) -> Self {
        let (state, _) = watch::channel(AllowanceState::default());
        Self {
            store,
            reader,
            spender,
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Read model for the current session and `wallet`
    pub fn snapshot(&self, wallet: &WalletSnapshot) -> AllowanceSnapshot {
        let session = self.store.snapshot();
        let state = self.state.borrow().clone();

        // an allowance read for another token or account says nothing here
        let owner = wallet
            .address
            .filter(|_| wallet.status != WalletStatus::Disconnected);
        let allowance = state
            .inputs
            .as_ref()
            .filter(|inputs| {
                session.pair.token_in.as_ref() == Some(&inputs.token)
                    && owner == Some(inputs.owner)
            })
            .and(state.allowance);

        AllowanceSnapshot {
            allowance,
            needs_approval: needs_approval(allowance, session.positive_amount_in_wei()),
            read_status: state.read_status,
            write_status: state.write_status,
            error: state.error,
            last_approval: state.last_approval,
        }
    }

    /// Re-read the allowance for the current session and wallet
    pub async fn refresh(&self, wallet: &WalletSnapshot) -> AllowanceSnapshot {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inputs = AllowanceInputs::resolve(&self.store.snapshot(), wallet);

        self.state.send_modify(|s| {
            if s.inputs != inputs {
                s.write_status = WriteStatus::Idle;
            }
            s.inputs = inputs.clone();
            s.allowance = None;
            s.error = None;
            s.read_status = if inputs.is_some() {
                ReadStatus::Checking
            } else {
                ReadStatus::Idle
            };
        });

        let Some(inputs) = inputs else {
            return self.snapshot(wallet);
        };

        let result = match self.spender {
            None => Err(SwapError::ContractMissing),
            Some(spender) => self
                .reader
                .allowance(inputs.token.address(), inputs.owner, spender)
                .await
                .map_err(|e| SwapError::AllowanceRead(e.to_string())),
        };

        let committed = self.state.send_if_modified(|s| {
            let current = self.generation.load(Ordering::SeqCst) == ticket;
            if !current || s.inputs.as_ref() != Some(&inputs) {
                return false;
            }
            match &result {
                Ok(allowance) => {
                    s.allowance = Some(*allowance);
                    s.read_status = ReadStatus::Ready;
                }
                Err(e) => {
                    s.read_status = ReadStatus::Error;
                    s.error = Some(e.to_string());
                }
            }
            true
        });

        match (&result, committed) {
            (_, false) => {
                tracing::debug!("Discarding stale allowance read (generation {})", ticket)
            }
            (Ok(allowance), true) => tracing::debug!(
                "Allowance of {} for {}: {}",
                inputs.token.symbol(),
                format_address(&inputs.owner),
                allowance
            ),
            (Err(e), true) => tracing::warn!("Allowance read failed: {}", e),
        }

        self.snapshot(wallet)
    }

    /// Approve the spender for exactly the current input amount, wait for
    /// confirmation, then re-read. Returns the approval transaction hash.
    pub async fn approve(
        &self,
        wallet: &WalletSnapshot,
        signer: Option<Arc<dyn TransactionSender>>,
    ) -> SwapResult<String> {
        let spender = self.spender.ok_or(SwapError::ContractMissing)?;
        let inputs = AllowanceInputs::resolve(&self.store.snapshot(), wallet);
        let (Some(signer), Some(inputs)) = (signer, inputs) else {
            return Err(SwapError::Approval("Approval prerequisites missing".into()));
        };

        // pin the inputs so the follow-up read keeps the write status
        self.state.send_modify(|s| {
            if s.inputs.as_ref() != Some(&inputs) {
                s.inputs = Some(inputs.clone());
                s.allowance = None;
                s.read_status = ReadStatus::Idle;
            }
            s.write_status = WriteStatus::Waiting;
            s.error = None;
        });

        let calldata = abi::approve_call(&spender, inputs.amount);
        let sent = async {
            let submitted = signer.send_transaction(inputs.token.address(), calldata).await?;
            let confirmation = signer.wait_for_confirmation(submitted).await?;
            if !confirmation.success {
                anyhow::bail!("approval transaction {} reverted", format_hash(&submitted));
            }
            anyhow::Ok(confirmation.hash.unwrap_or(submitted))
        }
        .await;

        match sent {
            Ok(hash) => {
                let hash = format_hash(&hash);
                tracing::info!(
                    "Approved {} {} for spending: {}",
                    inputs.amount,
                    inputs.token.symbol(),
                    hash
                );
                self.state.send_modify(|s| {
                    s.write_status = WriteStatus::Success;
                    s.last_approval = Some(hash.clone());
                });
                self.refresh(wallet).await;
                Ok(hash)
            }
            Err(e) => {
                let error = SwapError::Approval(e.to_string());
                tracing::warn!("{}", error);
                self.state.send_modify(|s| {
                    s.write_status = WriteStatus::Error;
                    s.error = Some(e.to_string());
                });
                Err(error)
            }
        }
    }
}
