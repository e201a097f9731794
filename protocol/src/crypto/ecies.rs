//! # Hybrid Encryption (secp256k1 ECIES)
//!
//! Every balance on the ledger, and every transfer amount a client sends us,
//! is sealed with this scheme:
//!
//! 1. Generate an ephemeral secp256k1 keypair.
//! 2. ECDH: `shared = ephemeral_secret * recipient_public`.
//! 3. HKDF-SHA256 over `ephemeral_public || shared` (both uncompressed, 65
//!    bytes each) yields a 32-byte AES-256-GCM key.
//! 4. Seal the plaintext under a fresh random 96-bit nonce.
//!
//! The recipient reverses step 2 with its own secret and the ephemeral
//! public key carried in the ciphertext. Nobody else can.
//!
//! ## Wire format
//!
//! ```text
//! +----------------------+-----------+------------------+-----------+
//! | ephemeral pk (65 B)  | nonce 12B | ciphertext body  | tag (16B) |
//! +----------------------+-----------+------------------+-----------+
//! ```
//!
//! Minimum length is 93 bytes (empty body). Anything shorter is rejected
//! before we touch a curve point.
//!
//! ## Failure modes
//!
//! Wrong key and corrupted ciphertext both surface as
//! [`CipherError::DecryptionFailure`]. GCM can't tell them apart, and we
//! wouldn't tell an attacker if it could.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::keys::{CloakKeypair, CloakPublicKey};
use crate::config::{
    AES_KEY_LENGTH, AES_NONCE_LENGTH, EPHEMERAL_KEY_LENGTH, HKDF_INFO, HKDF_SALT,
    MIN_CIPHERTEXT_LENGTH, UNCOMPRESSED_PUBLIC_KEY_LENGTH,
};

/// Errors from sealing or opening a hybrid ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("ciphertext too short: {0} bytes, expected at least {MIN_CIPHERTEXT_LENGTH}")]
    TooShortCiphertext(usize),

    #[error("malformed ciphertext: embedded ephemeral key is not a valid curve point")]
    MalformedCiphertext,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptionFailure,

    #[error("encryption failed")]
    EncryptFailed,
}

/// A ciphertext whose framing has been validated but not yet opened.
///
/// Parsing is key-independent, so when several candidate keys might own a
/// ciphertext the framing checks run once and only [`Envelope::open`] is
/// repeated per key.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    ephemeral: PublicKey,
    ephemeral_bytes: &'a [u8],
    nonce: &'a [u8],
    sealed: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Validate length and the embedded ephemeral point.
    pub fn parse(data: &'a [u8]) -> Result<Self, CipherError> {
        if data.len() < MIN_CIPHERTEXT_LENGTH {
            return Err(CipherError::TooShortCiphertext(data.len()));
        }

        let (ephemeral_bytes, rest) = data.split_at(EPHEMERAL_KEY_LENGTH);
        let (nonce, sealed) = rest.split_at(AES_NONCE_LENGTH);

        // Only the uncompressed encoding is valid here: a 65-byte slice with
        // a 0x02/0x03 tag fails the length check inside from_sec1_bytes.
        let ephemeral =
            PublicKey::from_sec1_bytes(ephemeral_bytes).map_err(|_| CipherError::MalformedCiphertext)?;

        Ok(Self {
            ephemeral,
            ephemeral_bytes,
            nonce,
            sealed,
        })
    }

    /// Length of the encrypted body, excluding the tag.
    pub fn body_len(&self) -> usize {
        self.sealed.len() - crate::config::AES_TAG_LENGTH
    }

    /// Attempt to open the envelope with `key`.
    pub fn open(&self, key: &CloakKeypair) -> Result<Vec<u8>, CipherError> {
        let shared = shared_point(key.secret_key(), &self.ephemeral);
        let aes_key = derive_symmetric_key(self.ephemeral_bytes, &shared)
            .map_err(|_| CipherError::DecryptionFailure)?;

        let cipher = Aes256Gcm::new_from_slice(&aes_key[..])
            .map_err(|_| CipherError::DecryptionFailure)?;
        cipher
            .decrypt(Nonce::from_slice(self.nonce), self.sealed)
            .map_err(|_| CipherError::DecryptionFailure)
    }
}

/// Seal `plaintext` for the holder of `recipient`'s secret key.
///
/// Consumes OS randomness for the ephemeral key and the nonce, so two calls
/// with identical inputs produce different ciphertexts.
///
/// # Example
///
/// ```
/// use cloak_protocol::crypto::{ecies, CloakKeypair};
///
/// let kp = CloakKeypair::generate();
/// let sealed = ecies::encrypt(&kp.public_key(), b"150").unwrap();
/// assert_eq!(ecies::decrypt(&kp, &sealed).unwrap(), b"150");
/// ```
pub fn encrypt(recipient: &CloakPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let ephemeral = SecretKey::random(&mut OsRng);
    let ephemeral_bytes = ephemeral.public_key().to_encoded_point(false);
    let shared = shared_point(&ephemeral, recipient.as_inner());
    let aes_key = derive_symmetric_key(ephemeral_bytes.as_bytes(), &shared)
        .map_err(|_| CipherError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher =
        Aes256Gcm::new_from_slice(&aes_key[..]).map_err(|_| CipherError::EncryptFailed)?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CipherError::EncryptFailed)?;

    let mut out = Vec::with_capacity(EPHEMERAL_KEY_LENGTH + AES_NONCE_LENGTH + sealed.len());
    out.extend_from_slice(ephemeral_bytes.as_bytes());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a ciphertext produced by [`encrypt`].
///
/// # Errors
///
/// - `TooShortCiphertext` if `data` is under 93 bytes.
/// - `MalformedCiphertext` if the embedded ephemeral key is not on the curve.
/// - `DecryptionFailure` if the tag doesn't verify.
pub fn decrypt(key: &CloakKeypair, data: &[u8]) -> Result<Vec<u8>, CipherError> {
    Envelope::parse(data)?.open(key)
}

/// Full uncompressed encoding of `secret * public`.
///
/// The x-coordinate alone (what `k256::ecdh` hands out) isn't enough: the
/// KDF input is the whole point, tag byte included.
fn shared_point(secret: &SecretKey, public: &PublicKey) -> [u8; UNCOMPRESSED_PUBLIC_KEY_LENGTH] {
    let product = public.to_projective() * *secret.to_nonzero_scalar();
    let affine = AffinePoint::from(product);
    let encoded = affine.to_encoded_point(false);

    let mut out = [0u8; UNCOMPRESSED_PUBLIC_KEY_LENGTH];
    out.copy_from_slice(encoded.as_bytes());
    out
}

fn derive_symmetric_key(
    ephemeral_public: &[u8],
    shared: &[u8; UNCOMPRESSED_PUBLIC_KEY_LENGTH],
) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, hkdf::InvalidLength> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(ephemeral_public.len() + shared.len()));
    ikm.extend_from_slice(ephemeral_public);
    ikm.extend_from_slice(shared);

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), &ikm);
    let mut okm = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    hk.expand(HKDF_INFO, &mut okm[..])?;
    Ok(okm)
}
