//! ECDSA signing and verification over secp256r1 and secp256k1.
//!
//! Signatures are the fixed-width 64-byte `r || s` form with both scalars
//! big-endian padded to 32 bytes. Verification hashes the message with
//! SHA-256 before the curve operation and fails on any malformed point,
//! the zero scalar, or `r`/`s` outside the group order.

use crate::ecpoint::ECPoint;
use crate::error::{CryptoError, CryptoResult};
use p256::ecdsa::signature::{Signer, Verifier};
use rand::rngs::OsRng;

/// The length of an encoded signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// The curves accepted by signature checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Secp256r1,
    Secp256k1,
}

/// A secp256r1 key pair used for witnesses and consensus messages.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: p256::ecdsa::SigningKey,
}

impl KeyPair {
    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: p256::ecdsa::SigningKey::random(&mut OsRng),
        }
    }

    /// Builds a key pair from a 32-byte private key.
    pub fn from_private_key(bytes: &[u8]) -> CryptoResult<Self> {
        let signing_key = p256::ecdsa::SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidKey("invalid private scalar".to_string()))?;
        Ok(Self { signing_key })
    }

    /// Parses a hex-encoded private key.
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Self::from_private_key(&bytes)
    }

    /// The private key bytes.
    pub fn private_key(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// The compressed public key.
    pub fn public_key(&self) -> ECPoint {
        ECPoint::from_public_key(&p256::PublicKey::from(self.signing_key.verifying_key()))
    }

    /// Signs `message` (SHA-256 digested) and returns the 64-byte `r || s`.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let signature: p256::ecdsa::Signature = self.signing_key.sign(message);
        // Normalized s keeps signatures canonical across implementations.
        let signature = signature.normalize_s().unwrap_or(signature);
        let mut out = [0u8; SIGNATURE_SIZE];
        out.copy_from_slice(&signature.to_bytes());
        out
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({})", self.public_key().to_hex())
    }
}

/// Signs a message with a secp256r1 key pair.
pub fn sign(message: &[u8], key: &KeyPair) -> [u8; SIGNATURE_SIZE] {
    key.sign(message)
}

/// Verifies a 64-byte signature over `message` for `public_key`.
///
/// `public_key` must be a 33-byte compressed point on the selected curve.
pub fn verify(curve: Curve, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    if signature.len() != SIGNATURE_SIZE {
        return false;
    }
    match curve {
        Curve::Secp256r1 => {
            let Ok(key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else {
                return false;
            };
            key.verify(message, &sig).is_ok()
        }
        Curve::Secp256k1 => {
            let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(sig) = k256::ecdsa::Signature::from_slice(signature) else {
                return false;
            };
            key.verify(message, &sig).is_ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let key = KeyPair::generate();
        let message = b"neo n3 block";
        let signature = key.sign(message);
        assert!(verify(
            Curve::Secp256r1,
            message,
            &signature,
            key.public_key().as_bytes()
        ));
    }

    #[test]
    fn verification_rejects_wrong_message() {
        let key = KeyPair::generate();
        let signature = key.sign(b"message a");
        assert!(!verify(
            Curve::Secp256r1,
            b"message b",
            &signature,
            key.public_key().as_bytes()
        ));
    }

    #[test]
    fn verification_rejects_zero_scalars() {
        let key = KeyPair::generate();
        let zero = [0u8; SIGNATURE_SIZE];
        assert!(!verify(
            Curve::Secp256r1,
            b"anything",
            &zero,
            key.public_key().as_bytes()
        ));
    }

    #[test]
    fn verification_rejects_truncated_signature() {
        let key = KeyPair::generate();
        let signature = key.sign(b"message");
        assert!(!verify(
            Curve::Secp256r1,
            b"message",
            &signature[..63],
            key.public_key().as_bytes()
        ));
    }

    #[test]
    fn private_key_round_trip_is_stable() {
        let key = KeyPair::generate();
        let restored = KeyPair::from_private_key(&key.private_key()).unwrap();
        assert_eq!(restored.public_key(), key.public_key());
    }

    #[test]
    fn secp256k1_verification_works() {
        use k256::ecdsa::signature::Signer as _;
        use k256::elliptic_curve::sec1::ToEncodedPoint as _;
        let signing = k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let message = b"cross-curve check";
        let signature: k256::ecdsa::Signature = signing.sign(message);
        let public = signing.verifying_key().to_encoded_point(true);
        assert!(verify(
            Curve::Secp256k1,
            message,
            &signature.to_bytes(),
            public.as_bytes()
        ));
        assert!(!verify(
            Curve::Secp256r1,
            message,
            &signature.to_bytes(),
            public.as_bytes()
        ));
    }
}
