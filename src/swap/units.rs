//! Decimal text <-> smallest-unit integer conversion

use primitive_types::U256;

use super::error::{SwapError, SwapResult};

/// Parse user-entered decimal text into the token's smallest unit.
///
/// `"1.5"` with 6 decimals is `1_500_000`. Fractional digits beyond
/// `decimals` are accepted only when they are all zeros.
pub fn parse_units(text: &str, decimals: u8) -> SwapResult<U256> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SwapError::AmountParse("amount is empty".into()));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(SwapError::AmountParse(format!("'{}' is not a number", text)));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SwapError::AmountParse(format!("'{}' is not a number", text)));
    }

    let decimals = decimals as usize;
    let fraction = if fraction.len() > decimals {
        let (kept, excess) = fraction.split_at(decimals);
        if excess.bytes().any(|b| b != b'0') {
            return Err(SwapError::AmountParse(format!(
                "too many decimal places (max {})",
                decimals
            )));
        }
        kept.to_string()
    } else {
        format!("{:0<width$}", fraction, width = decimals)
    };

    let digits = format!("{}{}", whole, fraction);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(digits).map_err(|_| SwapError::AmountParse("amount is too large".into()))
}

/// Render a smallest-unit integer as decimal text, e.g. `1.0`, `0.05`.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    let padded = if digits.len() <= decimals {
        format!("{:0>width$}", digits, width = decimals + 1)
    } else {
        digits
    };

    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, fraction)
    }
}
