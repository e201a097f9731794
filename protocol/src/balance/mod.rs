//! # Balances
//!
//! Everything between "bytes the ledger returned" and "a number we can do
//! arithmetic on". Plaintext balances exist only for the lifetime of one
//! invocation. They are never persisted and never logged in ciphertext form
//! alongside their plaintext.

pub mod amount;
pub mod resolver;

use thiserror::Error;

use crate::crypto::ecies::CipherError;

pub use amount::{format_amount, parse_balance, parse_decimal, AmountError};
pub use resolver::{
    decrypt_with_candidates, BalanceOrigin, BalanceResolver, CandidateKey, ResolvedBalance,
    UndecryptablePolicy,
};

/// Errors from resolving a stored balance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    /// The ciphertext opened, but its plaintext is not a non-negative
    /// number. The ledger is holding something we didn't write.
    #[error("corrupt balance for {account}: decrypted value is not a non-negative number")]
    CorruptBalance { account: String },

    /// The plaintext is a well-formed non-negative number, but one that
    /// can't be held exactly (too large, or too many decimal places).
    #[error("balance for {account} is out of the representable range")]
    BalanceOutOfRange { account: String },

    /// No candidate key could open a non-empty balance and the resolver is
    /// running in strict mode.
    #[error("balance for {account} could not be decrypted: {source}")]
    UndecryptableBalance {
        account: String,
        #[source]
        source: CipherError,
    },
}
