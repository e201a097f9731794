//! # Protocol Configuration & Constants
//!
//! Every magic number in Cloak lives here. The ciphertext layout, the KDF
//! parameters, submission limits and the chains we know about.
//! If you're hardcoding one of these somewhere else, move it here.
//!
//! Changing the ciphertext constants after balances have been written to a
//! ledger makes those balances unreadable. Don't.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Crate-level protocol version, surfaced in reports and `--version` output.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Key Material (secp256k1)
// ---------------------------------------------------------------------------

/// Curve used for key agreement, signing, and account addresses.
pub const CURVE: &str = "secp256k1";

/// Secret scalar length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Secret key length as hex characters (without the optional `0x`).
pub const SECRET_KEY_HEX_LENGTH: usize = SECRET_KEY_LENGTH * 2;

/// SEC1 compressed point: `0x02|0x03 || x`.
pub const COMPRESSED_PUBLIC_KEY_LENGTH: usize = 33;

/// SEC1 uncompressed point: `0x04 || x || y`.
pub const UNCOMPRESSED_PUBLIC_KEY_LENGTH: usize = 65;

/// Ethereum-style account addresses are the last 20 bytes of a Keccak-256.
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Hybrid Ciphertext Layout
// ---------------------------------------------------------------------------

/// Symmetric half of the hybrid scheme.
pub const SYMMETRIC_ALGORITHM: &str = "AES-256-GCM";

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Always twelve.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Ephemeral public key prefix of every ciphertext (uncompressed point).
pub const EPHEMERAL_KEY_LENGTH: usize = UNCOMPRESSED_PUBLIC_KEY_LENGTH;

/// Smallest well-formed ciphertext: `ephemeral key || nonce || tag` around
/// an empty body. 65 + 12 + 16 = 93 bytes.
pub const MIN_CIPHERTEXT_LENGTH: usize = EPHEMERAL_KEY_LENGTH + AES_NONCE_LENGTH + AES_TAG_LENGTH;

/// HKDF-SHA256 salt. Empty: the key schedule is defined with no salt.
pub const HKDF_SALT: &[u8] = b"";

/// HKDF-SHA256 info string. Also empty by definition.
pub const HKDF_INFO: &[u8] = b"";

// ---------------------------------------------------------------------------
// Submission Parameters
// ---------------------------------------------------------------------------

/// Headroom added on top of `eth_estimateGas`, in percent. Estimates are
/// taken against current state and a concurrent write can shift them.
pub const GAS_HEADROOM_PERCENT: u64 = 20;

/// Per-request timeout for JSON-RPC calls.
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Default Chain Registry
// ---------------------------------------------------------------------------

/// Chain used when the operator doesn't pick one.
pub const DEFAULT_CHAIN_ID: u64 = ARBITRUM_SEPOLIA_CHAIN_ID;

/// Arbitrum Sepolia: where the ledger contract is actually deployed.
pub const ARBITRUM_SEPOLIA_CHAIN_ID: u64 = 421_614;
pub const ARBITRUM_SEPOLIA_CONTRACT: &str = "0x3b3C98D7AfF91b7032d81fC25dfe8d8ECFe546CC";
pub const ARBITRUM_SEPOLIA_RPC: &str = "https://sepolia-rollup.arbitrum.io/rpc";

/// Base Sepolia: registered, contract not yet deployed.
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84_532;
pub const BASE_SEPOLIA_RPC: &str = "https://sepolia.base.org";

/// Ethereum Sepolia: registered, contract not yet deployed.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const SEPOLIA_RPC: &str = "https://rpc.sepolia.org";

/// Placeholder contract address for chains without a deployment. A registry
/// entry pointing here fails closed.
pub const UNDEPLOYED_CONTRACT: &str = "0x0000000000000000000000000000000000000000";
