//! Transaction submitter
//!
//! Turns the reviewed session into a `swapPrivate` call, waits for it to be
//! mined and records the receipt. Nothing is written to the store unless the
//! transaction confirmed successfully.

use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

use super::allowance::AllowanceSnapshot;
use super::error::{SwapError, SwapResult};
use super::session::{FlowState, SwapAction, TransactionReceipt};
use super::store::SwapStore;
use super::tokens::Address;
use crate::chain::{abi, format_hash, TransactionSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Idle,
    Preparing,
    Pending,
    Confirming,
    Success,
    Error,
}

impl SubmitStatus {
    fn in_flight(self) -> bool {
        matches!(
            self,
            SubmitStatus::Preparing | SubmitStatus::Pending | SubmitStatus::Confirming
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitState {
    pub status: SubmitStatus,
    pub message: Option<String>,
}

impl SubmitState {
    fn idle() -> Self {
        Self {
            status: SubmitStatus::Idle,
            message: None,
        }
    }
}

pub struct TransactionSubmitter {
    store: Arc<SwapStore>,
    amm: Option<Address>,
    state: watch::Sender<SubmitState>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl TransactionSubmitter {
    pub fn new(store: Arc<SwapStore>, amm: Option<Address>) -> Self {
        let (state, _) = watch::channel(SubmitState::idle());
        Self { store, amm, state }
    }

    pub fn state(&self) -> SubmitState {
        self.state.borrow().clone()
    }

    fn set(&self, status: SubmitStatus, message: impl Into<String>) {
        self.state.send_replace(SubmitState {
            status,
            message: Some(message.into()),
        });
    }

    fn fail(&self, error: SwapError) -> SwapError {
        tracing::warn!("{}", error);
        self.set(SubmitStatus::Error, error.to_string());
        error
    }

    /// Submit the swap for the current session, which must be at `review`.
    ///
    /// On success the receipt and the `confirmed` step are committed
    /// together; on failure the session is left untouched.
    pub async fn submit(
        &self,
        signer: Option<Arc<dyn TransactionSender>>,
        allowance: &AllowanceSnapshot,
    ) -> SwapResult<TransactionReceipt> {
        let claimed = self.state.send_if_modified(|s| {
            if s.status.in_flight() {
                return false;
            }
            *s = SubmitState {
                status: SubmitStatus::Preparing,
                message: Some("Encoding private payload".into()),
            };
            true
        });
        if !claimed {
            return Err(SwapError::PrerequisitesMissing(
                "a swap is already in progress".into(),
            ));
        }

        let session = self.store.snapshot();
        let missing = |what: &str| self.fail(SwapError::PrerequisitesMissing(what.to_string()));

        if session.step != FlowState::Review {
            return Err(missing("swaps are submitted from the review step"));
        }
        let Some(signer) = signer else {
            return Err(missing("wallet signer unavailable"));
        };
        let Some(amm) = self.amm else {
            return Err(missing("contract address missing"));
        };
        let Some((token_in, token_out)) = session.pair.both() else {
            return Err(missing("token pair not selected"));
        };
        if token_in == token_out {
            return Err(missing("input and output tokens are identical"));
        }
        let Some(amount_in) = session.positive_amount_in_wei() else {
            return Err(missing("amount must be a positive number"));
        };
        let Some(quote) = session.quote.as_ref().filter(|q| !q.amount_out_wei.is_zero()) else {
            return Err(missing("no quote for the current inputs"));
        };
        if allowance.needs_approval {
            return Err(missing("token allowance does not cover the amount"));
        }

        let payload = abi::pack_private_amount(amount_in);
        let calldata = abi::swap_private_call(
            &token_in.address(),
            &token_out.address(),
            &payload,
            quote.min_amount_out_wei,
            &signer.address(),
        );

        self.set(SubmitStatus::Pending, "Submitting swap transaction");
        let submitted = signer
            .send_transaction(amm, calldata)
            .await
            .map_err(|e| self.fail(SwapError::Submission(e.to_string())))?;

        self.set(SubmitStatus::Confirming, "Waiting for confirmation");
        let confirmation = signer
            .wait_for_confirmation(submitted)
            .await
            .map_err(|e| self.fail(SwapError::Confirmation(e.to_string())))?;
        if !confirmation.success {
            return Err(self.fail(SwapError::Confirmation(format!(
                "transaction {} reverted",
                format_hash(&submitted)
            ))));
        }

        let receipt = TransactionReceipt {
            hash: format_hash(&confirmation.hash.unwrap_or(submitted)),
            timestamp: unix_now(),
            amount_in: session.amount_in_text().to_string(),
            amount_out: Some(quote.formatted.clone()),
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            privacy_enabled: session.privacy_enabled,
        };

        let committed = self.store.dispatch_if(
            |s| s.step == FlowState::Review,
            [
                SwapAction::SetLastTx(receipt.clone()),
                SwapAction::SetStep(FlowState::Confirmed),
            ],
        );
        if !committed {
            // mined anyway; keep the receipt reachable from the confirmed tab
            self.store.dispatch(SwapAction::SetLastTx(receipt.clone()));
            tracing::warn!(
                "Swap {} confirmed after the flow left review; step unchanged",
                receipt.hash
            );
        }
        tracing::info!(
            "Swap {} {} -> {} confirmed: {}",
            receipt.amount_in,
            receipt.token_in.symbol(),
            receipt.token_out.symbol(),
            receipt.hash
        );
        self.set(SubmitStatus::Success, "Swap confirmed!");
        Ok(receipt)
    }

    /// Back to idle, e.g. when a new swap starts
    pub fn reset(&self) {
        self.state.send_if_modified(|s| {
            if s.status.in_flight() {
                return false;
            }
            *s = SubmitState::idle();
            true
        });
    }
}
