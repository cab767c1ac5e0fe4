//! Wallet and contract addresses are stored and compared lowercase.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must be 40 hex characters: {0}")]
    InvalidLength(String),
    #[error("address contains non-hex characters: {0}")]
    InvalidHex(String),
}

/// Validate an EVM address and return its lowercase form.
pub fn normalize_address(raw: &str) -> Result<String, AddressError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AddressError::MissingPrefix(raw.to_string()))?;

    if body.len() != 40 {
        return Err(AddressError::InvalidLength(raw.to_string()));
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::InvalidHex(raw.to_string()));
    }

    Ok(format!("0x{}", body.to_ascii_lowercase()))
}
