//! Token registry
//!
//! Static catalog of tradeable tokens. Addresses are parsed into 20-byte
//! values, so comparisons are case-insensitive by construction.

use primitive_types::H160;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::error::{SwapError, SwapResult};

/// 20-byte account / contract identifier
pub type Address = H160;

/// Parse a `0x`-prefixed (or bare) 40 hex digit address, any letter case
pub fn parse_address(text: &str) -> SwapResult<Address> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 40 {
        return Err(SwapError::InvalidAddress(format!(
            "{} (expected 40 hex digits, got {})",
            text,
            digits.len()
        )));
    }

    let bytes = hex::decode(digits)
        .map_err(|e| SwapError::InvalidAddress(format!("{}: {}", text, e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Lowercase `0x` text form of an address
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// A tradeable token. Equality and hashing look at the address only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    address: Address,
    symbol: String,
    decimals: u8,
}

impl Token {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// The zero address is a placeholder for the native asset and has no
    /// token contract to query.
    pub fn is_balance_queryable(&self) -> bool {
        !self.address.is_zero()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// Registry of tokens offered for trading
#[derive(Debug, Clone)]
pub struct TokenCatalog {
    tokens: Vec<Token>,
}

impl TokenCatalog {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn all(&self) -> &[Token] {
        &self.tokens
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    pub fn by_address(&self, address: &Address) -> Option<&Token> {
        self.tokens.iter().find(|t| &t.address == address)
    }

    /// Look up by symbol first, then by address text
    pub fn resolve(&self, text: &str) -> SwapResult<Token> {
        if let Some(token) = self.by_symbol(text) {
            return Ok(token.clone());
        }
        let address = parse_address(text).map_err(|_| SwapError::UnknownToken(text.to_string()))?;
        self.by_address(&address)
            .cloned()
            .ok_or_else(|| SwapError::UnknownToken(text.to_string()))
    }

    /// Case-insensitive substring match on symbols; empty query returns all
    pub fn search(&self, query: &str) -> Vec<Token> {
        let lowered = query.trim().to_lowercase();
        if lowered.is_empty() {
            return self.tokens.clone();
        }
        self.tokens
            .iter()
            .filter(|t| t.symbol.to_lowercase().contains(&lowered))
            .cloned()
            .collect()
    }

    /// Pair preselected when the configure step opens with nothing chosen
    pub fn default_pair(&self) -> (Option<Token>, Option<Token>) {
        (self.tokens.first().cloned(), self.tokens.get(1).cloned())
    }
}

impl Default for TokenCatalog {
    fn default() -> Self {
        Self::new(vec![
            Token::new(Address::from_low_u64_be(0), "pAVAX", 18),
            Token::new(Address::from_low_u64_be(1), "pUSDC", 6),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_is_case_insensitive() {
        let lower = parse_address("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        let upper = parse_address("0XABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(
            format_address(&upper),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_token_equality_uses_address() {
        let a = Token::new(Address::from_low_u64_be(7), "AAA", 18);
        let b = Token::new(Address::from_low_u64_be(7), "aaa-renamed", 6);
        let c = Token::new(Address::from_low_u64_be(8), "AAA", 18);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_default_catalog() {
        let catalog = TokenCatalog::default();
        assert_eq!(catalog.all().len(), 2);

        let avax = catalog.by_symbol("pavax").unwrap();
        assert_eq!(avax.decimals(), 18);
        assert!(!avax.is_balance_queryable());

        let usdc = catalog
            .resolve("0x0000000000000000000000000000000000000001")
            .unwrap();
        assert_eq!(usdc.symbol(), "pUSDC");
        assert!(usdc.is_balance_queryable());

        assert!(matches!(catalog.resolve("DOGE"), Err(SwapError::UnknownToken(_))));
    }

    #[test]
    fn test_search() {
        let catalog = TokenCatalog::default();
        assert_eq!(catalog.search("").len(), 2);
        let hits = catalog.search("usd");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol(), "pUSDC");
        assert!(catalog.search("btc").is_empty());
    }
}
