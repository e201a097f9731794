//! # Key Management
//!
//! secp256k1 keypairs for the two roles an invocation plays: decryption
//! authority (opening ciphertexts addressed to us) and signer (authorizing
//! the ledger write). In the default deployment both roles share one secret.
//!
//! ## Security considerations
//!
//! - Secret scalars are zeroized on drop (k256's `SecretKey` handles this),
//!   and the intermediate hex-decoded buffer is wrapped in `Zeroizing`.
//! - Secrets are never printed. `Debug` shows the public key only, and the
//!   only textual form of a secret that leaves this module is
//!   [`redact_secret`], which is all asterisks.

use std::fmt;

use alloy::primitives::keccak256;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use super::encoding::{encode_hex_prefixed, strip_hex_prefix};
use crate::config::{
    ADDRESS_LENGTH, COMPRESSED_PUBLIC_KEY_LENGTH, SECRET_KEY_HEX_LENGTH,
    UNCOMPRESSED_PUBLIC_KEY_LENGTH,
};

/// Errors that can occur during key operations.
///
/// Deliberately vague about the secret itself. The reason string says which
/// rule was broken, never what the offending bytes were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(&'static str),

    #[error("invalid public key bytes: not a valid secp256k1 point")]
    InvalidPublicKey,
}

/// A secp256k1 keypair.
///
/// `CloakKeypair` intentionally does NOT implement `Serialize`. Secrets enter
/// the process as configuration and never leave it.
///
/// # Examples
///
/// ```
/// use cloak_protocol::crypto::keys::CloakKeypair;
///
/// let kp = CloakKeypair::from_hex(
///     "0x0000000000000000000000000000000000000000000000000000000000000001",
/// )
/// .unwrap();
/// assert_eq!(
///     kp.address_hex(),
///     "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
/// );
/// ```
#[derive(Clone)]
pub struct CloakKeypair {
    secret: SecretKey,
}

/// The public half of a keypair, or a recipient key read from the ledger.
#[derive(Clone, PartialEq, Eq)]
pub struct CloakPublicKey {
    inner: PublicKey,
}

impl CloakKeypair {
    /// Fresh keypair from the OS RNG. Used for ephemeral keys and tests.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Parse a hex secret, with or without a `0x` prefix.
    ///
    /// Exactly 64 hex characters are required, and the scalar must lie in
    /// `[1, n)`. Anything else is `InvalidKeyEncoding`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let clean = strip_hex_prefix(hex_str.trim());
        if clean.len() != SECRET_KEY_HEX_LENGTH {
            return Err(KeyError::InvalidKeyEncoding("expected 64 hex characters"));
        }
        let bytes = Zeroizing::new(
            hex::decode(clean).map_err(|_| KeyError::InvalidKeyEncoding("not a hex string"))?,
        );
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| KeyError::InvalidKeyEncoding("scalar out of range for secp256k1"))?;
        Ok(Self { secret })
    }

    /// The public point `secret * G`.
    pub fn public_key(&self) -> CloakPublicKey {
        CloakPublicKey {
            inner: self.secret.public_key(),
        }
    }

    /// Compressed SEC1 encoding of the public key (33 bytes).
    pub fn public_key_compressed(&self) -> [u8; COMPRESSED_PUBLIC_KEY_LENGTH] {
        self.public_key().to_compressed()
    }

    /// Uncompressed SEC1 encoding of the public key (65 bytes).
    pub fn public_key_uncompressed(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_LENGTH] {
        self.public_key().to_uncompressed()
    }

    /// Account address controlled by this key.
    pub fn address(&self) -> [u8; ADDRESS_LENGTH] {
        self.public_key().address()
    }

    /// `0x`-prefixed lowercase account address.
    pub fn address_hex(&self) -> String {
        encode_hex_prefixed(&self.address())
    }

    /// ECDSA signing key over the same scalar.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }

    /// The underlying secret, for the hybrid cipher's key agreement.
    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for CloakKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CloakKeypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for CloakKeypair {
    /// Keypairs compare by public key. Comparing secrets in variable time
    /// is a habit worth not having.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for CloakKeypair {}

// ---------------------------------------------------------------------------
// CloakPublicKey
// ---------------------------------------------------------------------------

impl CloakPublicKey {
    /// Parse a SEC1-encoded point, compressed (33 bytes) or uncompressed
    /// (65 bytes). Off-curve points and the identity are rejected.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != COMPRESSED_PUBLIC_KEY_LENGTH
            && bytes.len() != UNCOMPRESSED_PUBLIC_KEY_LENGTH
        {
            return Err(KeyError::InvalidPublicKey);
        }
        let inner = PublicKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { inner })
    }

    pub fn to_compressed(&self) -> [u8; COMPRESSED_PUBLIC_KEY_LENGTH] {
        let mut out = [0u8; COMPRESSED_PUBLIC_KEY_LENGTH];
        out.copy_from_slice(self.inner.to_encoded_point(true).as_bytes());
        out
    }

    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_LENGTH] {
        let mut out = [0u8; UNCOMPRESSED_PUBLIC_KEY_LENGTH];
        out.copy_from_slice(self.inner.to_encoded_point(false).as_bytes());
        out
    }

    /// `keccak256(x || y)[12..]`.
    pub fn address(&self) -> [u8; ADDRESS_LENGTH] {
        let uncompressed = self.to_uncompressed();
        let digest = keccak256(&uncompressed[1..]);
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
        out
    }

    /// Compressed form as unprefixed hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    pub(crate) fn as_inner(&self) -> &PublicKey {
        &self.inner
    }
}

impl fmt::Debug for CloakPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CloakPublicKey({})", self.to_hex())
    }
}

/// Mask a secret for diagnostics: one `*` per character. Length is the only
/// thing it gives away, and length is public anyway.
pub fn redact_secret(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const APP_SECRET: &str = "abb483444a79c9e62776e2c8707939426791663abba76a1272f1bf3d4bd901f1";

    #[test]
    fn test_secret_one_is_generator() {
        let kp = CloakKeypair::from_hex(SECRET_ONE).unwrap();
        assert_eq!(
            hex::encode(kp.public_key_uncompressed()),
            "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
             483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
        );
        assert_eq!(
            hex::encode(kp.public_key_compressed()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_address_of_secret_one() {
        let kp = CloakKeypair::from_hex(SECRET_ONE).unwrap();
        assert_eq!(kp.address_hex(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_prefix_is_optional() {
        let a = CloakKeypair::from_hex(APP_SECRET).unwrap();
        let b = CloakKeypair::from_hex(&format!("0x{APP_SECRET}")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            CloakKeypair::from_hex(&APP_SECRET[..62]),
            Err(KeyError::InvalidKeyEncoding(_))
        ));
        assert!(matches!(
            CloakKeypair::from_hex(&format!("{APP_SECRET}00")),
            Err(KeyError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = "g".repeat(64);
        assert!(matches!(
            CloakKeypair::from_hex(&bad),
            Err(KeyError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_zero_scalar_rejected() {
        let zero = "0".repeat(64);
        assert!(matches!(
            CloakKeypair::from_hex(&zero),
            Err(KeyError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_curve_order_rejected() {
        let n = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";
        assert!(matches!(
            CloakKeypair::from_hex(n),
            Err(KeyError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_public_key_parses_both_encodings() {
        let kp = CloakKeypair::generate();
        let from_compressed = CloakPublicKey::from_sec1_bytes(&kp.public_key_compressed()).unwrap();
        let from_uncompressed =
            CloakPublicKey::from_sec1_bytes(&kp.public_key_uncompressed()).unwrap();
        assert_eq!(from_compressed, from_uncompressed);
        assert_eq!(from_compressed, kp.public_key());
    }

    #[test]
    fn test_public_key_rejects_garbage() {
        assert_eq!(
            CloakPublicKey::from_sec1_bytes(&[0x04; 65]),
            Err(KeyError::InvalidPublicKey)
        );
        assert_eq!(
            CloakPublicKey::from_sec1_bytes(&[0x02; 10]),
            Err(KeyError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let kp = CloakKeypair::from_hex(APP_SECRET).unwrap();
        let dbg = format!("{kp:?}");
        assert!(!dbg.contains(APP_SECRET));
        assert!(dbg.contains(&kp.public_key().to_hex()));
    }

    #[test]
    fn test_redaction_masks_every_character() {
        let masked = redact_secret(APP_SECRET);
        assert_eq!(masked.len(), APP_SECRET.len());
        assert!(masked.chars().all(|c| c == '*'));
    }
}
