//! Private swap engine
//!
//! Client-side orchestration for private token swaps against a
//! constant-product AMM, served over HTTP.

pub mod api;
pub mod chain;
pub mod config;
pub mod swap;
pub mod types;
