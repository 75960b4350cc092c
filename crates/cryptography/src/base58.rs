//! Base58Check encoding used for Neo addresses and WIF keys.

use crate::error::{CryptoError, CryptoResult};
use crate::hash::hash256;

/// Encodes `data` with a 4-byte double-SHA-256 checksum suffix.
pub fn base58check_encode(data: &[u8]) -> String {
    let checksum = hash256(data);
    let mut payload = Vec::with_capacity(data.len() + 4);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&checksum[..4]);
    bs58::encode(payload).into_string()
}

/// Decodes a Base58Check string, validating the checksum.
pub fn base58check_decode(input: &str) -> CryptoResult<Vec<u8>> {
    let decoded = bs58::decode(input)
        .into_vec()
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    if decoded.len() < 4 {
        return Err(CryptoError::InvalidEncoding(
            "input shorter than checksum".to_string(),
        ));
    }
    let (data, checksum) = decoded.split_at(decoded.len() - 4);
    if hash256(data)[..4] != *checksum {
        return Err(CryptoError::ChecksumMismatch);
    }
    Ok(data.to_vec())
}
