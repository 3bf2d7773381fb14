//! Swap session aggregate and its reducer
//!
//! `SwapSession` is the single source of truth for one swap flow. It only
//! changes through `SwapSession::reduce`, a pure and total function of
//! (session, action). Validation lives in the components that consume it.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{SwapError, SwapResult};
use super::tokens::Token;
use super::units::parse_units;

/// The four flow states, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Connect,
    Configure,
    Review,
    Confirmed,
}

impl FlowState {
    pub const ORDER: [FlowState; 4] = [
        FlowState::Connect,
        FlowState::Configure,
        FlowState::Review,
        FlowState::Confirmed,
    ];

    pub fn index(self) -> usize {
        match self {
            FlowState::Connect => 0,
            FlowState::Configure => 1,
            FlowState::Review => 2,
            FlowState::Confirmed => 3,
        }
    }

    /// Successor in the fixed order; `Confirmed` is terminal
    pub fn next(self) -> Self {
        Self::ORDER.get(self.index() + 1).copied().unwrap_or(self)
    }

    /// Predecessor in the fixed order; `Connect` has none
    pub fn previous(self) -> Self {
        match self.index() {
            0 => self,
            i => Self::ORDER[i - 1],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Connect => "connect",
            FlowState::Configure => "configure",
            FlowState::Review => "review",
            FlowState::Confirmed => "confirmed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Connect => "Connect",
            FlowState::Configure => "Configure",
            FlowState::Review => "Review",
            FlowState::Confirmed => "Confirmed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FlowState::Connect => "Link your wallet and verify the network.",
            FlowState::Configure => "Select tokens, set amounts, and choose privacy.",
            FlowState::Review => "Confirm approvals, quotes, and recipient before sending.",
            FlowState::Confirmed => "Track transaction status and share your receipt.",
        }
    }
}

/// Step name that is not one of the four flow states
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step: {0}")]
pub struct UnknownStep(pub String);

impl FromStr for FlowState {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connect" => Ok(FlowState::Connect),
            "configure" => Ok(FlowState::Configure),
            "review" => Ok(FlowState::Review),
            "confirmed" => Ok(FlowState::Confirmed),
            _ => Err(UnknownStep(s.to_string())),
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selected trading pair. Also used as the partial update for `SetPair`:
/// `Some` fields overwrite, `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub token_in: Option<Token>,
    pub token_out: Option<Token>,
}

impl Pair {
    pub fn new(token_in: Token, token_out: Token) -> Self {
        Self {
            token_in: Some(token_in),
            token_out: Some(token_out),
        }
    }

    /// Both sides, if both are selected
    pub fn both(&self) -> Option<(&Token, &Token)> {
        match (&self.token_in, &self.token_out) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Both sides selected and different
    pub fn is_tradeable(&self) -> bool {
        matches!(self.both(), Some((a, b)) if a != b)
    }

    fn merge(&mut self, update: Pair) {
        if let Some(token_in) = update.token_in {
            self.token_in = Some(token_in);
        }
        if let Some(token_out) = update.token_out {
            self.token_out = Some(token_out);
        }
    }
}

/// Amount fields. `amount_in` is raw user text; the others are display
/// values derived from the current quote. Also the partial update for
/// `SetAmounts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amounts {
    pub amount_in: Option<String>,
    pub amount_out: Option<String>,
    pub min_amount_out: Option<String>,
}

impl Amounts {
    pub fn input(text: impl Into<String>) -> Self {
        Self {
            amount_in: Some(text.into()),
            ..Default::default()
        }
    }

    fn merge(&mut self, update: Amounts) {
        if let Some(amount_in) = update.amount_in {
            self.amount_in = Some(amount_in);
        }
        if let Some(amount_out) = update.amount_out {
            self.amount_out = Some(amount_out);
        }
        if let Some(min_amount_out) = update.min_amount_out {
            self.min_amount_out = Some(min_amount_out);
        }
    }

    fn clear_derived(&mut self) {
        self.amount_out = None;
        self.min_amount_out = None;
    }
}

/// Result of a successful quote for the current pair and amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub amount_out_wei: U256,
    pub min_amount_out_wei: U256,
    pub formatted: String,
    pub formatted_min: String,
    pub price_impact_bps: u32,
}

/// Record of a confirmed swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: String,
    /// Unix seconds
    pub timestamp: u64,
    pub amount_in: String,
    pub amount_out: Option<String>,
    pub token_in: Token,
    pub token_out: Token,
    pub privacy_enabled: bool,
}

/// Named mutations accepted by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum SwapAction {
    SetStep(FlowState),
    NextStep,
    SetPair(Pair),
    SetAmounts(Amounts),
    TogglePrivacy(bool),
    SetQuote(Option<Quote>),
    SetLastTx(TransactionReceipt),
    ClearLastTx,
    Reset,
}

impl SwapAction {
    pub fn name(&self) -> &'static str {
        match self {
            SwapAction::SetStep(_) => "SET_STEP",
            SwapAction::NextStep => "NEXT_STEP",
            SwapAction::SetPair(_) => "SET_PAIR",
            SwapAction::SetAmounts(_) => "SET_AMOUNTS",
            SwapAction::TogglePrivacy(_) => "TOGGLE_PRIVACY",
            SwapAction::SetQuote(_) => "SET_QUOTE",
            SwapAction::SetLastTx(_) => "SET_LAST_TX",
            SwapAction::ClearLastTx => "CLEAR_LAST_TX",
            SwapAction::Reset => "RESET",
        }
    }
}

/// Aggregate root of one swap flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSession {
    pub step: FlowState,
    pub pair: Pair,
    pub amounts: Amounts,
    pub privacy_enabled: bool,
    pub quote: Option<Quote>,
    pub last_tx: Option<TransactionReceipt>,
}

impl Default for SwapSession {
    fn default() -> Self {
        Self::initial()
    }
}

impl SwapSession {
    pub fn initial() -> Self {
        Self {
            step: FlowState::Connect,
            pair: Pair::default(),
            amounts: Amounts::default(),
            privacy_enabled: true,
            quote: None,
            last_tx: None,
        }
    }

    /// Apply one action. Total: every action yields a session.
    ///
    /// A change to the pair or to `amount_in` drops the quote and the
    /// display amounts derived from it, so a quote is only ever present for
    /// the inputs it was computed from.
    pub fn reduce(mut self, action: SwapAction) -> Self {
        match action {
            SwapAction::SetStep(step) => self.step = step,
            SwapAction::NextStep => self.step = self.step.next(),
            SwapAction::SetPair(update) => {
                let before = self.pair.clone();
                self.pair.merge(update);
                if self.pair != before {
                    self.clear_quote();
                }
            }
            SwapAction::SetAmounts(update) => {
                let before = self.amounts.amount_in.clone();
                self.amounts.merge(update);
                if self.amounts.amount_in != before {
                    self.clear_quote();
                }
            }
            SwapAction::TogglePrivacy(enabled) => self.privacy_enabled = enabled,
            SwapAction::SetQuote(Some(quote)) => self.quote = Some(quote),
            SwapAction::SetQuote(None) => self.clear_quote(),
            SwapAction::SetLastTx(receipt) => self.last_tx = Some(receipt),
            SwapAction::ClearLastTx => self.last_tx = None,
            SwapAction::Reset => return Self::initial(),
        }
        self
    }

    fn clear_quote(&mut self) {
        self.quote = None;
        self.amounts.clear_derived();
    }

    pub fn amount_in_text(&self) -> &str {
        self.amounts.amount_in.as_deref().unwrap_or("")
    }

    /// `amount_in` scaled to the input token's smallest unit
    pub fn amount_in_wei(&self) -> SwapResult<U256> {
        let token = self.pair.token_in.as_ref().ok_or(SwapError::PairIncomplete)?;
        parse_units(self.amount_in_text(), token.decimals())
    }

    /// `amount_in_wei` only when it parses and is strictly positive
    pub fn positive_amount_in_wei(&self) -> Option<U256> {
        self.amount_in_wei().ok().filter(|amount| !amount.is_zero())
    }
}
