//! # Cryptographic Primitives for Cloak
//!
//! Every ciphertext that crosses the ledger boundary and every key we hold
//! flows through here. Transaction encoding and signing belong to alloy in
//! `ledger::rpc`.
//!
//! Boring, well-audited building blocks only:
//!
//! - **secp256k1** (k256) for key agreement and transaction signatures. It's
//!   what the ledger chain uses, so it's what we use.
//! - **HKDF-SHA256** to turn a Diffie-Hellman point into a symmetric key.
//! - **AES-256-GCM** for the authenticated symmetric half.
//! - **Keccak-256** (via `alloy-primitives`) for account addresses.
//!
//! Everything here is a thin, type-safe wrapper. If you're tempted to
//! optimize one of these functions, please reconsider.

pub mod ecies;
pub mod encoding;
pub mod keys;

pub use ecies::{decrypt, encrypt, CipherError, Envelope};
pub use encoding::{decode_hex, encode_hex_prefixed, EncodingError};
pub use keys::{redact_secret, CloakKeypair, CloakPublicKey, KeyError};
