// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cloak Protocol: Core Library
//!
//! Confidential balance transfers against a ledger that only ever sees
//! ciphertext. An agent holding the decryption keys receives a sealed
//! amount and two accounts, rebuilds the plaintext balances, checks and
//! applies the transfer, and writes two freshly sealed balances back in a
//! single signed contract call.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **crypto**: secp256k1 ECIES (ECDH + HKDF-SHA256 + AES-256-GCM), key
//!   material, Keccak-256.
//! - **balance**: ledger bytes to plaintext numbers, including the
//!   "account never written" case and multi-key fallback.
//! - **ledger**: the [`ledger::LedgerGateway`] seam, the chain registry,
//!   and a JSON-RPC implementation built on alloy's `sol!` bindings and
//!   provider.
//! - **transfer**: the arithmetic and the [`transfer::TransferEngine`] that
//!   runs one invocation end to end.
//! - **config**: protocol constants and default deployments.
//!
//! ## Ground Rules
//!
//! 1. Plaintext balances live for one invocation and are never persisted.
//! 2. Secrets never reach a log line or an output file.
//! 3. At most one ledger write per invocation. No retries, ever.
//! 4. Money is `Decimal`, not `f64`. The total is conserved exactly.

pub mod balance;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod transfer;
