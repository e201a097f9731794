//! # Confidential Transfers
//!
//! The engine that ties the rest of the crate together: take a sealed
//! amount and two accounts, read the ledger, do the arithmetic on plaintext
//! inside the enclave, and commit two freshly sealed balances.
//!
//! - [`types`]: accounts, requests, snapshots and receipts.
//! - [`compute`]: the arithmetic, pure and exact.
//! - [`engine`]: [`TransferEngine`], one invocation end to end.
//! - [`error`]: [`EngineError`] and its flat [`ErrorKind`] classification.

pub mod compute;
pub mod engine;
pub mod error;
pub mod types;

pub use compute::{compute_transfer, parse_transfer_amount, TransferOutcome};
pub use engine::{BalanceModel, Credentials, EngineOptions, KeyStrategy, TransferEngine};
pub use error::{EngineError, ErrorKind, TransferError};
pub use types::{Account, LedgerSnapshot, PartyReport, TransferReceipt, TransferRequest};
