//! Engine configuration from the environment

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

use crate::swap::flow::{FlowSettings, DEFAULT_CHAIN_ID};
use crate::swap::quote::{BPS_DENOMINATOR, DEFAULT_SLIPPAGE_BPS};
use crate::swap::steps::TabPolicy;
use crate::swap::tokens::{parse_address, Address};

/// Avalanche Fuji public C-Chain endpoint
pub const DEFAULT_RPC_URL: &str = "https://api.avax-test.network/ext/bc/C/rpc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// AMM contract and allowance spender. `None` when unset or zero.
    pub contract_address: Option<Address>,
    pub rpc_url: String,
    pub chain_id: u64,
    pub slippage_bps: u32,
    pub receipt_poll_interval: Duration,
    /// Preferred node-managed account
    pub wallet_account: Option<Address>,
    pub bind_addr: SocketAddr,
    pub tab_policy: TabPolicy,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let contract_address = get("SWAP_CONTRACT_ADDRESS")
            .map(|text| parse_address(&text).context("SWAP_CONTRACT_ADDRESS"))
            .transpose()?
            .filter(|address| !address.is_zero());

        let chain_id = match get("SWAP_CHAIN_ID") {
            Some(text) => parse_chain_id(&text).context("SWAP_CHAIN_ID")?,
            None => DEFAULT_CHAIN_ID,
        };

        let slippage_bps = match get("SWAP_SLIPPAGE_BPS") {
            Some(text) => text.parse::<u32>().context("SWAP_SLIPPAGE_BPS")?,
            None => DEFAULT_SLIPPAGE_BPS,
        };
        if slippage_bps > BPS_DENOMINATOR {
            bail!(
                "SWAP_SLIPPAGE_BPS must be at most {}, got {}",
                BPS_DENOMINATOR,
                slippage_bps
            );
        }

        let poll_ms = match get("SWAP_RECEIPT_POLL_MS") {
            Some(text) => text.parse::<u64>().context("SWAP_RECEIPT_POLL_MS")?,
            None => DEFAULT_RECEIPT_POLL_MS,
        };

        let wallet_account = get("SWAP_WALLET_ACCOUNT")
            .map(|text| parse_address(&text).context("SWAP_WALLET_ACCOUNT"))
            .transpose()?;

        let bind_addr = get("SWAP_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("SWAP_BIND_ADDR")?;

        let tab_policy = match get("SWAP_TAB_POLICY").as_deref() {
            None | Some("backward_only") => TabPolicy::BackwardOnly,
            Some("gated") => TabPolicy::Gated,
            Some(other) => bail!("SWAP_TAB_POLICY must be backward_only or gated, got {}", other),
        };

        Ok(Self {
            contract_address,
            rpc_url: get("SWAP_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            chain_id,
            slippage_bps,
            receipt_poll_interval: Duration::from_millis(poll_ms),
            wallet_account,
            bind_addr,
            tab_policy,
        })
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            amm: self.contract_address,
            required_chain_id: self.chain_id,
            slippage_bps: self.slippage_bps,
            tab_policy: self.tab_policy,
        }
    }
}

/// Decimal or `0x` hex
fn parse_chain_id(text: &str) -> Result<u64> {
    match text.strip_prefix("0x") {
        Some(hex) => {
            u64::from_str_radix(hex, 16).with_context(|| format!("invalid chain id {}", text))
        }
        None => text
            .parse::<u64>()
            .with_context(|| format!("invalid chain id {}", text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<EngineConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert!(config.contract_address.is_none());
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.chain_id, 43113);
        assert_eq!(config.slippage_bps, 50);
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(1000));
        assert_eq!(config.bind_addr, "0.0.0.0:3001".parse().unwrap());
        assert_eq!(config.tab_policy, TabPolicy::BackwardOnly);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("SWAP_CONTRACT_ADDRESS", "0x00000000000000000000000000000000000000Cc"),
            ("SWAP_RPC_URL", "http://localhost:8545"),
            ("SWAP_CHAIN_ID", "0x7a69"),
            ("SWAP_SLIPPAGE_BPS", "100"),
            ("SWAP_RECEIPT_POLL_MS", "250"),
            ("SWAP_BIND_ADDR", "127.0.0.1:9000"),
            ("SWAP_TAB_POLICY", "gated"),
        ])
        .unwrap();
        assert_eq!(config.contract_address, Some(Address::from_low_u64_be(0xcc)));
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.slippage_bps, 100);
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(250));

        let settings = config.flow_settings();
        assert_eq!(settings.amm, Some(Address::from_low_u64_be(0xcc)));
        assert_eq!(settings.required_chain_id, 31337);
        assert_eq!(settings.tab_policy, TabPolicy::Gated);
    }

    #[test]
    fn test_zero_or_blank_contract_is_absent() {
        let zero = config(&[(
            "SWAP_CONTRACT_ADDRESS",
            "0x0000000000000000000000000000000000000000",
        )])
        .unwrap();
        assert!(zero.contract_address.is_none());
        assert!(config(&[("SWAP_CONTRACT_ADDRESS", "  ")])
            .unwrap()
            .contract_address
            .is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config(&[("SWAP_SLIPPAGE_BPS", "10001")]).is_err());
        assert!(config(&[("SWAP_CHAIN_ID", "fuji")]).is_err());
        assert!(config(&[("SWAP_CONTRACT_ADDRESS", "0x1234")]).is_err());
        assert!(config(&[("SWAP_TAB_POLICY", "anything")]).is_err());
    }
}
