//! Minimal Solidity ABI codec for the calls the swap flow makes
//!
//! Static arguments are 32-byte words; `bytes` uses the standard
//! head/tail layout (offset in the head, length + padded data in the tail).

use anyhow::{anyhow, Result};
use primitive_types::U256;
use sha3::{Digest, Keccak256};

use crate::swap::tokens::Address;

const WORD: usize = 32;

pub const GET_RESERVES: &str = "getReserves(address,address)";
pub const SWAP_PRIVATE: &str = "swapPrivate(address,address,bytes,uint256,address)";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const BALANCE_OF: &str = "balanceOf(address)";

/// First four bytes of keccak256 of the canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn call(signature: &str, words: &[[u8; WORD]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + words.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for word in words {
        data.extend_from_slice(word);
    }
    data
}

pub fn get_reserves_call(token_a: &Address, token_b: &Address) -> Vec<u8> {
    call(GET_RESERVES, &[address_word(token_a), address_word(token_b)])
}

pub fn allowance_call(owner: &Address, spender: &Address) -> Vec<u8> {
    call(ALLOWANCE, &[address_word(owner), address_word(spender)])
}

/// Approve `spender` for exactly `amount`
pub fn approve_call(spender: &Address, amount: U256) -> Vec<u8> {
    call(APPROVE, &[address_word(spender), uint_word(amount)])
}

pub fn balance_of_call(owner: &Address) -> Vec<u8> {
    call(BALANCE_OF, &[address_word(owner)])
}

pub fn swap_private_call(
    token_a: &Address,
    token_b: &Address,
    encrypted_amount: &[u8],
    min_amount_b: U256,
    to: &Address,
) -> Vec<u8> {
    // five head slots, the dynamic payload starts right after them
    let payload_offset = U256::from(5 * WORD);
    let mut data = call(
        SWAP_PRIVATE,
        &[
            address_word(token_a),
            address_word(token_b),
            uint_word(payload_offset),
            uint_word(min_amount_b),
            address_word(to),
        ],
    );

    data.extend_from_slice(&uint_word(U256::from(encrypted_amount.len())));
    data.extend_from_slice(encrypted_amount);
    let padding = (WORD - encrypted_amount.len() % WORD) % WORD;
    data.extend(std::iter::repeat(0u8).take(padding));
    data
}

/// Amount payload for `swapPrivate`: the amount packed as one big-endian
/// uint256. This is a plain encoding, not a ciphertext.
pub fn pack_private_amount(amount: U256) -> Vec<u8> {
    uint_word(amount).to_vec()
}

/// Read the `index`-th 32-byte word of return data as an unsigned integer
pub fn decode_uint(data: &[u8], index: usize) -> Result<U256> {
    let start = index * WORD;
    let word = data.get(start..start + WORD).ok_or_else(|| {
        anyhow!(
            "Return data too short: {} bytes, need word {}",
            data.len(),
            index
        )
    })?;
    Ok(U256::from_big_endian(word))
}

pub fn decode_reserves(data: &[u8]) -> Result<(U256, U256)> {
    Ok((decode_uint(data, 0)?, decode_uint(data, 1)?))
}

/// Recover `(spender, amount)` from `approve` calldata
pub fn decode_approve_call(data: &[u8]) -> Result<(Address, U256)> {
    let body = data
        .strip_prefix(&selector(APPROVE)[..])
        .ok_or_else(|| anyhow!("Not an approve call"))?;
    let spender_word = body
        .get(..WORD)
        .ok_or_else(|| anyhow!("Truncated approve call"))?;
    let spender = Address::from_slice(&spender_word[12..]);
    Ok((spender, decode_uint(body, 1)?))
}
