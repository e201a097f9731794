//! Error types for the transfer engine.
//!
//! Each layer keeps its own `thiserror` enum. [`EngineError`] wraps them at
//! the engine boundary and [`ErrorKind`] is the flat, stable classification
//! that ends up in failure reports.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::balance::BalanceError;
use crate::crypto::ecies::CipherError;
use crate::crypto::encoding::EncodingError;
use crate::ledger::LedgerError;

/// Failures of the transfer arithmetic itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The decrypted amount is not a number, or is not strictly positive.
    /// The plaintext is deliberately not echoed.
    #[error("invalid transfer amount: must be a number greater than zero")]
    InvalidAmount,

    /// The decrypted amount is a number, but not one a `Decimal` holds
    /// exactly. Rounding it would move a different sum than was sealed.
    #[error("transfer amount is out of the representable range")]
    AmountOutOfRange,

    /// The sender cannot cover the amount. Failure reports are readable by
    /// the requester, so the message carries no figures; the fields do, for
    /// callers that log at their own discretion.
    #[error("insufficient balance for this transfer")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    /// Overflow, a negative result, or a transfer that doesn't conserve
    /// the total.
    #[error("arithmetic invariant violated: {0}")]
    ArithmeticInvariantViolation(String),

    /// Sender and receiver are the same account. Executed naively that
    /// would credit the amount without debiting it.
    #[error("sender and receiver must be different accounts")]
    SameAccount,
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Classification written into failure reports as `error-kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ConfigurationError,
    EncodingError,
    InvalidRequest,
    TooShortCiphertext,
    MalformedCiphertext,
    DecryptionFailure,
    UndecryptableBalance,
    CorruptBalance,
    InvalidAmount,
    AmountOutOfRange,
    InsufficientBalance,
    ArithmeticInvariantViolation,
    EncryptionFailure,
    UnsupportedChain,
    NetworkError,
    SubmissionFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::EncodingError => "EncodingError",
            Self::InvalidRequest => "InvalidRequest",
            Self::TooShortCiphertext => "TooShortCiphertext",
            Self::MalformedCiphertext => "MalformedCiphertext",
            Self::DecryptionFailure => "DecryptionFailure",
            Self::UndecryptableBalance => "UndecryptableBalance",
            Self::CorruptBalance => "CorruptBalance",
            Self::InvalidAmount => "InvalidAmount",
            Self::AmountOutOfRange => "AmountOutOfRange",
            Self::InsufficientBalance => "InsufficientBalance",
            Self::ArithmeticInvariantViolation => "ArithmeticInvariantViolation",
            Self::EncryptionFailure => "EncryptionFailure",
            Self::UnsupportedChain => "UnsupportedChain",
            Self::NetworkError => "NetworkError",
            Self::SubmissionFailure => "SubmissionFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Everything a transfer invocation can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Credentials or options that can't work, e.g. a ledger-only key
    /// strategy with no ledger key supplied.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The transfer amount itself could not be opened. Always fatal.
    #[error("transfer amount could not be decrypted: {0}")]
    AmountDecryption(#[source] CipherError),

    /// Sealing a new balance failed.
    #[error("failed to encrypt new balance: {0}")]
    Encryption(#[source] CipherError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::Encoding(_) => ErrorKind::EncodingError,
            Self::AmountDecryption(e) => match e {
                CipherError::TooShortCiphertext(_) => ErrorKind::TooShortCiphertext,
                CipherError::MalformedCiphertext => ErrorKind::MalformedCiphertext,
                CipherError::DecryptionFailure | CipherError::EncryptFailed => {
                    ErrorKind::DecryptionFailure
                }
            },
            Self::Encryption(_) => ErrorKind::EncryptionFailure,
            Self::Balance(e) => match e {
                BalanceError::CorruptBalance { .. } => ErrorKind::CorruptBalance,
                BalanceError::UndecryptableBalance { .. } => ErrorKind::UndecryptableBalance,
                BalanceError::BalanceOutOfRange { .. } => ErrorKind::AmountOutOfRange,
            },
            Self::Transfer(e) => match e {
                TransferError::InvalidAmount => ErrorKind::InvalidAmount,
                TransferError::AmountOutOfRange => ErrorKind::AmountOutOfRange,
                TransferError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
                TransferError::ArithmeticInvariantViolation(_) => {
                    ErrorKind::ArithmeticInvariantViolation
                }
                TransferError::SameAccount => ErrorKind::InvalidRequest,
            },
            Self::Ledger(e) => match e {
                LedgerError::UnsupportedChain { .. } | LedgerError::ContractNotDeployed(_) => {
                    ErrorKind::UnsupportedChain
                }
                LedgerError::Registry(_) => ErrorKind::ConfigurationError,
                LedgerError::InvalidAccount(_) => ErrorKind::InvalidRequest,
                LedgerError::Network(_) | LedgerError::InvalidResponse(_) => {
                    ErrorKind::NetworkError
                }
                LedgerError::Submission(_) => ErrorKind::SubmissionFailure,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_decryption_kinds_follow_cipher_error() {
        assert_eq!(
            EngineError::AmountDecryption(CipherError::TooShortCiphertext(92)).kind(),
            ErrorKind::TooShortCiphertext
        );
        assert_eq!(
            EngineError::AmountDecryption(CipherError::MalformedCiphertext).kind(),
            ErrorKind::MalformedCiphertext
        );
        assert_eq!(
            EngineError::AmountDecryption(CipherError::DecryptionFailure).kind(),
            ErrorKind::DecryptionFailure
        );
    }

    #[test]
    fn test_ledger_kinds() {
        let unsupported = EngineError::from(LedgerError::UnsupportedChain {
            chain_id: 999_999,
            supported: "421614".into(),
        });
        assert_eq!(unsupported.kind(), ErrorKind::UnsupportedChain);
        assert_eq!(
            EngineError::from(LedgerError::ContractNotDeployed(84_532)).kind(),
            ErrorKind::UnsupportedChain
        );
        assert_eq!(
            EngineError::from(LedgerError::InvalidResponse("x".into())).kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(
            EngineError::from(LedgerError::Submission("reverted".into())).kind(),
            ErrorKind::SubmissionFailure
        );
    }

    #[test]
    fn test_out_of_range_is_its_own_kind() {
        assert_eq!(
            EngineError::from(TransferError::AmountOutOfRange).kind(),
            ErrorKind::AmountOutOfRange
        );
        assert_eq!(
            EngineError::from(BalanceError::BalanceOutOfRange {
                account: "0xabc".into()
            })
            .kind(),
            ErrorKind::AmountOutOfRange
        );
        assert_ne!(
            EngineError::from(BalanceError::CorruptBalance {
                account: "0xabc".into()
            })
            .kind(),
            ErrorKind::AmountOutOfRange
        );
    }

    #[test]
    fn test_insufficient_balance_message_has_no_figures() {
        let err = EngineError::from(TransferError::InsufficientBalance {
            available: Decimal::from(50),
            requested: Decimal::from(100),
        });
        let msg = err.to_string();
        assert!(!msg.contains("50"));
        assert!(!msg.contains("100"));
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_kind_serializes_as_its_name() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::ArithmeticInvariantViolation).unwrap(),
            "\"ArithmeticInvariantViolation\""
        );
        assert_eq!(ErrorKind::NetworkError.to_string(), "NetworkError");
    }
}
