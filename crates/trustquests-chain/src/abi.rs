//! Minimal Solidity ABI support for the calls this service makes:
//! static `address`/`uint256` arguments, one level of `address[]`, and
//! single-word return values.

use sha3::{Digest, Keccak256};

use trustquests_types::normalize_address;

use crate::error::ChainError;

const WORD: usize = 32;

pub type Address = [u8; 20];

/// A call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    AddressArray(Vec<Address>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::AddressArray(_))
    }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// First four bytes of the Keccak hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by the head/tail encoding of `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(args.len() * WORD);
    let mut tail = Vec::new();
    let head_len = args.len() * WORD;

    for arg in args {
        if arg.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            encode_tail(arg, &mut tail);
        } else {
            head.extend_from_slice(&static_word(arg));
        }
    }

    let mut out = Vec::with_capacity(4 + head.len() + tail.len());
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    out
}

fn static_word(token: &Token) -> [u8; WORD] {
    match token {
        Token::Address(addr) => address_word(addr),
        Token::Uint(v) => uint_word(*v),
        Token::AddressArray(_) => unreachable!("dynamic tokens are encoded in the tail"),
    }
}

fn encode_tail(token: &Token, tail: &mut Vec<u8>) {
    if let Token::AddressArray(items) = token {
        tail.extend_from_slice(&uint_word(items.len() as u128));
        for addr in items {
            tail.extend_from_slice(&address_word(addr));
        }
    }
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&v.to_be_bytes());
    word
}

fn address_word(addr: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(addr);
    word
}

/// Parse a `0x`-prefixed hex address into raw bytes.
pub fn parse_address(raw: &str) -> Result<Address, ChainError> {
    let normalized = normalize_address(raw)?;
    let mut out = [0u8; 20];
    hex::decode_to_slice(&normalized[2..], &mut out)
        .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
    Ok(out)
}

pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Decode the first return word as a `uint256` that must fit in 128 bits.
pub fn decode_uint(data: &[u8]) -> Result<u128, ChainError> {
    let word = first_word(data)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Err(ChainError::InvalidResponse("uint256 exceeds 128 bits".into()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Decode the first return word as an `address`.
pub fn decode_address(data: &[u8]) -> Result<String, ChainError> {
    let word = first_word(data)?;
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&word[12..]);
    Ok(format_address(&addr))
}

fn first_word(data: &[u8]) -> Result<&[u8], ChainError> {
    if data.len() < WORD {
        return Err(ChainError::InvalidResponse(format!(
            "expected at least {} bytes of return data, got {}",
            WORD,
            data.len()
        )));
    }
    Ok(&data[..WORD])
}

/// Raw integer units to a decimal token amount.
pub fn format_units(value: u128, decimals: u32) -> f64 {
    value as f64 / 10f64.powi(decimals as i32)
}

/// Decimal token amount to raw integer units, rounded to the nearest unit.
pub fn parse_units(amount: f64, decimals: u32) -> u128 {
    if amount <= 0.0 || !amount.is_finite() {
        return 0;
    }
    (amount * 10f64.powi(decimals as i32)).round() as u128
}
