//! Vocabulary of a transfer invocation: who, how much (sealed), what the
//! ledger held, and what we committed.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::BalanceOrigin;
use crate::crypto::encoding::{decode_hex, EncodingError};
use crate::ledger::hex_bytes;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// An account on the ledger. Opaque to everything except the gateway, which
/// expects a 20-byte hex address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Addresses are case-insensitive (EIP-55 checksums are only a casing
    /// convention), so two spellings of one address are the same account.
    pub fn same_as(&self, other: &Account) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.0.trim())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Request / Snapshot
// ---------------------------------------------------------------------------

/// One transfer order. Consumed by exactly one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Amount sealed under one of the candidate keys.
    pub encrypted_amount: Vec<u8>,
    pub sender: Account,
    pub receiver: Account,
}

impl TransferRequest {
    /// Build a request from the hex form the requester hands us (`0x`
    /// optional).
    pub fn from_hex(
        encrypted_amount_hex: &str,
        sender: impl Into<String>,
        receiver: impl Into<String>,
    ) -> Result<Self, EncodingError> {
        Ok(Self {
            encrypted_amount: decode_hex(encrypted_amount_hex.trim())?,
            sender: Account::new(sender),
            receiver: Account::new(receiver),
        })
    }
}

/// What the ledger held at the start of the invocation. Read fresh every
/// time; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub encryption_public_key: Vec<u8>,
    /// Empty when the account was never written.
    pub sender_balance: Vec<u8>,
    pub receiver_balance: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// One side of the transfer, before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyReport {
    pub account: Account,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    /// Where `previous_balance` came from.
    pub origin: BalanceOrigin,
    /// The ciphertext committed to the ledger for `new_balance`.
    #[serde(with = "hex_bytes")]
    pub new_ciphertext: Vec<u8>,
}

/// The confirmation record of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub invocation_id: Uuid,
    pub chain_id: u64,
    pub chain_name: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub sender: PartyReport,
    pub receiver: PartyReport,
    /// Compressed SEC1 hex of the key the new balances were sealed under.
    pub encryption_public_key: String,
    /// Soft failures the invocation survived, e.g. a balance resolved to
    /// zero because no candidate key could open it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl TransferReceipt {
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }
}
