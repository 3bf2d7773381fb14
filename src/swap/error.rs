//! Engine error taxonomy
//!
//! Every component converts its failures into one of these variants at its
//! own boundary and keeps the message on its local status. Nothing here is
//! meant to unwind the flow.

use primitive_types::U256;

use super::session::FlowState;

/// Result type for engine operations
pub type SwapResult<T> = Result<T, SwapError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("Wallet unavailable: {0}")]
    Connection(String),

    #[error("Wrong network: expected chain {expected}, connected to {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("Invalid amount: {0}")]
    AmountParse(String),

    #[error("Insufficient liquidity for this pair")]
    InsufficientLiquidity,

    #[error("Quoted output amount is zero")]
    ZeroOutput,

    #[error("Failed to fetch quote: {0}")]
    QuoteFetch(String),

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    #[error("Cannot swap a token for itself")]
    IdenticalTokens,

    #[error("Token pair not selected")]
    PairIncomplete,

    #[error("Failed to load allowance: {0}")]
    AllowanceRead(String),

    #[error("Approval failed: {0}")]
    Approval(String),

    #[error("Swap prerequisites missing: {0}")]
    PrerequisitesMissing(String),

    #[error("Swap submission failed: {0}")]
    Submission(String),

    #[error("Swap confirmation failed: {0}")]
    Confirmation(String),

    #[error("Cannot leave step {step}: {reason}")]
    StepLocked { step: FlowState, reason: String },

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Contract address missing")]
    ContractMissing,

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl SwapError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            SwapError::Connection(_) => "CONNECTION_ERROR",
            SwapError::NetworkMismatch { .. } => "NETWORK_MISMATCH",
            SwapError::AmountParse(_) => "AMOUNT_PARSE_ERROR",
            SwapError::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            SwapError::ZeroOutput => "ZERO_OUTPUT",
            SwapError::QuoteFetch(_) => "QUOTE_FETCH_ERROR",
            SwapError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            SwapError::BalanceUnavailable(_) => "BALANCE_UNAVAILABLE",
            SwapError::IdenticalTokens => "IDENTICAL_TOKENS",
            SwapError::PairIncomplete => "PAIR_INCOMPLETE",
            SwapError::AllowanceRead(_) => "ALLOWANCE_READ_ERROR",
            SwapError::Approval(_) => "APPROVAL_ERROR",
            SwapError::PrerequisitesMissing(_) => "PREREQUISITES_MISSING",
            SwapError::Submission(_) => "SUBMISSION_ERROR",
            SwapError::Confirmation(_) => "CONFIRMATION_ERROR",
            SwapError::StepLocked { .. } => "STEP_LOCKED",
            SwapError::UnknownToken(_) => "UNKNOWN_TOKEN",
            SwapError::InvalidAddress(_) => "INVALID_ADDRESS",
            SwapError::ContractMissing => "CONTRACT_MISSING",
            SwapError::Overflow(_) => "OVERFLOW",
        }
    }
}
