//! Constant-product quote engine
//!
//! Reads pool reserves for the selected pair and derives the expected
//! output, the minimum output after slippage and the price impact.
//!
//! Every refresh takes a generation ticket and remembers the inputs it was
//! started for. A response is only committed when its ticket is still the
//! newest and the session still holds the same inputs; anything else is
//! dropped without touching the store.

use primitive_types::{U256, U512};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::error::{SwapError, SwapResult};
use super::session::{Amounts, Quote, SwapAction, SwapSession};
use super::store::SwapStore;
use super::tokens::{Address, Token};
use super::units::format_units;
use crate::chain::ChainReader;

/// 0.5%
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Raw numbers of one quote, before formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteAmounts {
    pub amount_out: U256,
    pub min_amount_out: U256,
    pub price_impact_bps: u32,
}

fn narrow(value: U512, what: &'static str) -> SwapResult<U256> {
    U256::try_from(value).map_err(|_| SwapError::Overflow(what))
}

/// Constant-product output without a fee term, all divisions floored.
///
/// ```text
/// amountOut      = amountIn * reserveOut / (reserveIn + amountIn)
/// minAmountOut   = amountOut * (10000 - slippageBps) / 10000
/// priceImpactBps = amountOut * 10000 / reserveOut
/// ```
pub fn compute_quote(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    slippage_bps: u32,
) -> SwapResult<QuoteAmounts> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SwapError::InsufficientLiquidity);
    }

    let denominator = U512::from(reserve_in) + U512::from(amount_in);
    let amount_out = narrow(amount_in.full_mul(reserve_out) / denominator, "amount out")?;
    if amount_out.is_zero() {
        return Err(SwapError::ZeroOutput);
    }

    let keep = U256::from(BPS_DENOMINATOR.saturating_sub(slippage_bps));
    let bps = U512::from(BPS_DENOMINATOR);
    let min_amount_out = narrow(amount_out.full_mul(keep) / bps, "minimum amount out")?;

    // amount_out < reserve_out, so the impact always fits below 10000
    let impact = amount_out.full_mul(U256::from(BPS_DENOMINATOR)) / U512::from(reserve_out);
    if impact > bps {
        return Err(SwapError::Overflow("price impact"));
    }

    Ok(QuoteAmounts {
        amount_out,
        min_amount_out,
        price_impact_bps: impact.low_u32(),
    })
}

/// The pair and amount a quote is computed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteInputs {
    pub token_in: Token,
    pub token_out: Token,
    pub amount_in_wei: U256,
}

impl QuoteInputs {
    /// Present only for a tradeable pair and a strictly positive amount
    pub fn from_session(session: &SwapSession) -> Option<Self> {
        if !session.pair.is_tradeable() {
            return None;
        }
        let (token_in, token_out) = session.pair.both()?;
        Some(Self {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in_wei: session.positive_amount_in_wei()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteState {
    pub status: QuoteStatus,
    pub error: Option<String>,
    pub slippage_bps: u32,
}

/// What a refresh did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteOutcome {
    Applied(Quote),
    /// Inputs incomplete; any quote was removed
    Cleared,
    /// Computation failed; any quote was removed
    Failed(SwapError),
    /// A newer refresh or an input change made this result irrelevant
    Superseded,
}

pub struct QuoteEngine {
    store: Arc<SwapStore>,
    reader: Arc<dyn ChainReader>,
    amm: Option<Address>,
    slippage_bps: u32,
    generation: AtomicU64,
    state: watch::Sender<QuoteState>,
}

impl QuoteEngine {
    pub fn new(
        store: Arc<SwapStore>,
        reader: Arc<dyn ChainReader>,
        amm: Option<Address>,
        slippage_bps: u32,
    ) -> Self {
        let (state, _) = watch::channel(QuoteState {
            status: QuoteStatus::Idle,
            error: None,
            slippage_bps,
        });
        Self {
            store,
            reader,
            amm,
            slippage_bps,
            generation: AtomicU64::new(0),
            state,
        }
    }

    pub fn state(&self) -> QuoteState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QuoteState> {
        self.state.subscribe()
    }

    fn set_status(&self, status: QuoteStatus, error: Option<String>) {
        self.state.send_modify(|s| {
            s.status = status;
            s.error = error;
        });
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    /// Re-derive the quote from the current session
    pub async fn refresh(&self) -> QuoteOutcome {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = self.store.snapshot();

        let Some(inputs) = QuoteInputs::from_session(&session) else {
            let applied = self.store.dispatch_if(
                |s| self.is_current(ticket) && QuoteInputs::from_session(s).is_none(),
                [SwapAction::SetQuote(None)],
            );
            if !applied {
                return QuoteOutcome::Superseded;
            }
            self.set_status(QuoteStatus::Idle, None);
            return QuoteOutcome::Cleared;
        };

        self.set_status(QuoteStatus::Loading, None);
        let result = self.fetch(&inputs).await;

        let still_relevant = |s: &SwapSession| {
            self.is_current(ticket) && QuoteInputs::from_session(s).as_ref() == Some(&inputs)
        };

        match result {
            Ok(quote) => {
                let applied = self.store.dispatch_if(
                    still_relevant,
                    [
                        SwapAction::SetQuote(Some(quote.clone())),
                        SwapAction::SetAmounts(Amounts {
                            amount_in: None,
                            amount_out: Some(quote.formatted.clone()),
                            min_amount_out: Some(quote.formatted_min.clone()),
                        }),
                    ],
                );
                if !applied {
                    tracing::debug!("Discarding stale quote (generation {})", ticket);
                    return QuoteOutcome::Superseded;
                }
                self.set_status(QuoteStatus::Success, None);
                QuoteOutcome::Applied(quote)
            }
            Err(e) => {
                if !self.store.dispatch_if(still_relevant, [SwapAction::SetQuote(None)]) {
                    tracing::debug!("Discarding stale quote failure (generation {})", ticket);
                    return QuoteOutcome::Superseded;
                }
                tracing::warn!(
                    "Quote {} -> {} failed: {}",
                    inputs.token_in.symbol(),
                    inputs.token_out.symbol(),
                    e
                );
                self.set_status(QuoteStatus::Error, Some(e.to_string()));
                QuoteOutcome::Failed(e)
            }
        }
    }

    async fn fetch(&self, inputs: &QuoteInputs) -> SwapResult<Quote> {
        let amm = self.amm.ok_or(SwapError::ContractMissing)?;
        let (reserve_in, reserve_out) = self
            .reader
            .get_reserves(amm, inputs.token_in.address(), inputs.token_out.address())
            .await
            .map_err(|e| SwapError::QuoteFetch(e.to_string()))?;

        tracing::debug!(
            "Reserves {}/{}: {} / {}",
            inputs.token_in.symbol(),
            inputs.token_out.symbol(),
            reserve_in,
            reserve_out
        );

        let amounts = compute_quote(
            inputs.amount_in_wei,
            reserve_in,
            reserve_out,
            self.slippage_bps,
        )?;
        let decimals = inputs.token_out.decimals();
        Ok(Quote {
            amount_out_wei: amounts.amount_out,
            min_amount_out_wei: amounts.min_amount_out,
            formatted: format_units(amounts.amount_out, decimals),
            formatted_min: format_units(amounts.min_amount_out, decimals),
            price_impact_bps: amounts.price_impact_bps,
        })
    }
}
