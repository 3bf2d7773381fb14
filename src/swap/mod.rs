//! Swap orchestration engine
//!
//! Drives one token swap from wallet connection to confirmed receipt:
//! - `session` / `store`: the session aggregate and its serialized dispatch
//! - `steps`: gates between the connect, configure, review and confirmed steps
//! - `quote`, `allowance`, `balance`: derivations from chain reads
//! - `submitter`: the swap transaction itself
//! - `flow`: the per-session context wiring these together

pub mod allowance;
pub mod balance;
pub mod error;
pub mod flow;
pub mod quote;
pub mod session;
pub mod steps;
pub mod store;
pub mod submitter;
pub mod tokens;
pub mod units;

pub use error::{SwapError, SwapResult};
pub use flow::{FlowSettings, FlowView, SessionManager, SwapFlow};
pub use session::{FlowState, SwapAction, SwapSession};
pub use tokens::{Token, TokenCatalog};
