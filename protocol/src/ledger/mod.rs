//! # Ledger Gateway
//!
//! The ledger is a contract that stores one opaque ciphertext per account
//! plus the public key new balances must be sealed under. This module is the
//! only way Cloak talks to it.
//!
//! The engine depends on the [`LedgerGateway`] trait, never on a concrete
//! transport. Two implementations ship:
//!
//! - [`rpc::JsonRpcLedger`] speaks Ethereum JSON-RPC through an alloy
//!   provider: `eth_call` for reads, one signed transaction for the write.
//! - [`memory::InMemoryLedger`] keeps everything in a map. Tests use it to
//!   count calls and inject failures.
//!
//! Which chain to talk to is an explicit [`ChainRegistry`] handed in at
//! construction. There is no global chain table.
//!
//! ## Retries
//!
//! There are none, and there must not be. A submission that timed out may
//! still have landed; sending it again could apply the same transfer twice.

pub mod memory;
pub mod registry;
pub mod rpc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::crypto::keys::CloakKeypair;
use crate::transfer::types::Account;

pub use memory::InMemoryLedger;
pub use registry::{ChainConfig, ChainRegistry};
pub use rpc::JsonRpcLedger;

/// Errors surfaced by a ledger gateway or the chain registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unsupported chain id {chain_id} (supported: {supported})")]
    UnsupportedChain { chain_id: u64, supported: String },

    #[error("no ledger contract deployed on chain {0}")]
    ContractNotDeployed(u64),

    #[error("chain registry error: {0}")]
    Registry(String),

    #[error("invalid account identifier {0:?}: expected a 20-byte hex address")]
    InvalidAccount(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected ledger response: {0}")]
    InvalidResponse(String),

    #[error("balance update submission failed: {0}")]
    Submission(String),
}

/// The two new ciphertexts to commit, and whose they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceUpdate {
    pub sender: Account,
    pub receiver: Account,
    #[serde(with = "hex_bytes")]
    pub sender_ciphertext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub receiver_ciphertext: Vec<u8>,
}

/// Read and write access to the encrypted-balance ledger on one chain.
///
/// Implementations perform no retries of their own.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// SEC1 bytes of the key balances must be encrypted under.
    async fn read_encryption_public_key(&self, chain: &ChainConfig) -> Result<Vec<u8>, LedgerError>;

    /// Stored ciphertext for `account`. Empty when the account has never
    /// been written.
    async fn read_encrypted_balance(
        &self,
        chain: &ChainConfig,
        account: &Account,
    ) -> Result<Vec<u8>, LedgerError>;

    /// Commit both balances in one signed call. Returns the transaction id.
    async fn submit_balance_update(
        &self,
        chain: &ChainConfig,
        signer: &CloakKeypair,
        update: &BalanceUpdate,
    ) -> Result<String, LedgerError>;
}

/// `0x`-hex serialization for byte fields in reports.
pub(crate) mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::crypto::encoding::encode_hex_prefixed(bytes))
    }
}
