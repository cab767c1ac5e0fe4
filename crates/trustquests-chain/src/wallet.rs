use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::abi::{format_address, keccak256};
use crate::error::ChainError;

/// A secp256k1 key used to sign transactions and login messages.
pub struct Wallet {
    key: SigningKey,
    address: String,
}

/// A recoverable signature split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1, the parity of the ephemeral point's y coordinate.
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// 65-byte `r || s || v` form with `v = 27 + recovery_id`.
    pub fn to_rsv_hex(&self) -> String {
        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        out.push(27 + self.recovery_id);
        format!("0x{}", hex::encode(out))
    }
}

impl Wallet {
    pub fn from_hex(private_key: &str) -> Result<Self, ChainError> {
        let raw = private_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|_| ChainError::InvalidKey)?;
        let key = SigningKey::from_slice(&bytes).map_err(|_| ChainError::InvalidKey)?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Lowercase `0x` address derived from the public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature, ChainError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash)
            .map_err(|e| ChainError::InvalidSignature(e.to_string()))?;
        Ok(split(&signature, recovery_id))
    }

    /// EIP-191 `personal_sign`.
    pub fn sign_personal(&self, message: &[u8]) -> Result<RecoverableSignature, ChainError> {
        self.sign_hash(&personal_message_hash(message))
    }
}

pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    format_address(&addr)
}

pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Recover the signer of a `personal_sign` signature (hex `r || s || v`).
pub fn recover_personal(message: &[u8], signature_hex: &str) -> Result<String, ChainError> {
    let raw = signature_hex.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).map_err(|e| ChainError::InvalidSignature(e.to_string()))?;
    if bytes.len() != 65 {
        return Err(ChainError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        27 | 28 => bytes[64] - 27,
        0 | 1 => bytes[64],
        other => {
            return Err(ChainError::InvalidSignature(format!("bad recovery byte {}", other)));
        }
    };

    let mut signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| ChainError::InvalidSignature(e.to_string()))?;
    let mut recovery_id =
        RecoveryId::from_byte(v).ok_or_else(|| ChainError::InvalidSignature("bad recovery id".into()))?;

    // High-s signatures are valid on Ethereum but rejected by the verifier;
    // flip to the low-s twin, which recovers with the opposite parity.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(&personal_message_hash(message), &signature, recovery_id)
        .map_err(|e| ChainError::InvalidSignature(e.to_string()))?;
    Ok(address_of(&key))
}

fn split(signature: &Signature, recovery_id: RecoveryId) -> RecoverableSignature {
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    RecoverableSignature {
        r,
        s,
        recovery_id: recovery_id.to_byte(),
    }
}
