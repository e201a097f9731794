//! # Balance Resolution
//!
//! Turns whatever the ledger has stored for an account into a plaintext
//! number. Three situations show up in practice:
//!
//! - **Nothing stored.** The account has never been written. That's a zero
//!   balance, not an error, and there's nothing to decrypt.
//! - **A ciphertext one of our keys can open.** Balances may have been
//!   sealed under the application key or under a separate ledger-side key,
//!   and we can't tell which from the bytes. So we try each
//!   [`CandidateKey`] in order and stop at the first that opens it.
//! - **A ciphertext none of our keys can open.** What happens then is an
//!   explicit [`UndecryptablePolicy`], not a silent catch-all.
//!
//! A ciphertext that opens but doesn't hold a non-negative number is always
//! fatal: that's ledger corruption, and no policy papers over it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::{parse_balance, AmountError};
use super::BalanceError;
use crate::crypto::ecies::{CipherError, Envelope};
use crate::crypto::keys::CloakKeypair;
use crate::transfer::types::Account;

/// A decryption key with a human-readable role, e.g. `"app"` or `"ledger"`.
/// The label shows up in logs and reports; the key never does.
#[derive(Debug, Clone)]
pub struct CandidateKey {
    label: String,
    keypair: CloakKeypair,
}

impl CandidateKey {
    pub fn new(label: impl Into<String>, keypair: CloakKeypair) -> Self {
        Self {
            label: label.into(),
            keypair,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn keypair(&self) -> &CloakKeypair {
        &self.keypair
    }
}

/// What to do when a non-empty balance can't be opened by any candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndecryptablePolicy {
    /// Resolve to zero and flag the anomaly. Keeps a garbled balance from
    /// blocking every transfer *into* that account, at the price of hiding
    /// corruption from whoever doesn't read the logs.
    #[default]
    TreatAsZero,
    /// Fail the invocation.
    Reject,
}

/// Where a resolved balance came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceOrigin {
    /// No ciphertext stored.
    Uninitialized,
    /// Opened by the candidate at `key_index`.
    Decrypted { key_index: usize, key_label: String },
    /// Stored bytes no candidate could open; resolved to zero by policy.
    Undecryptable { reason: String },
    /// Never read. The zero-sum balance model fixes the prior balances
    /// instead of asking the ledger.
    Assumed,
}

/// A plaintext balance plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBalance {
    pub amount: Decimal,
    pub origin: BalanceOrigin,
}

impl ResolvedBalance {
    fn zero(origin: BalanceOrigin) -> Self {
        Self {
            amount: Decimal::ZERO,
            origin,
        }
    }

    /// Index of the candidate key that opened the ciphertext, if any.
    pub fn used_key(&self) -> Option<usize> {
        match self.origin {
            BalanceOrigin::Decrypted { key_index, .. } => Some(key_index),
            _ => None,
        }
    }

    /// `true` when the zero came from the undecryptable fallback rather than
    /// from an empty account. Callers surface this as a soft failure.
    pub fn is_anomalous(&self) -> bool {
        matches!(self.origin, BalanceOrigin::Undecryptable { .. })
    }
}

/// Try each candidate in order; return the plaintext and the index of the
/// key that opened it.
///
/// Framing errors (`TooShortCiphertext`, `MalformedCiphertext`) don't depend
/// on the key and are returned before any candidate is tried. If every
/// candidate fails, or there are none, the result is `DecryptionFailure`.
pub fn decrypt_with_candidates(
    candidates: &[CandidateKey],
    data: &[u8],
) -> Result<(Vec<u8>, usize), CipherError> {
    let envelope = Envelope::parse(data)?;
    tracing::debug!(
        body_bytes = envelope.body_len(),
        candidates = candidates.len(),
        "opening ciphertext"
    );
    for (index, candidate) in candidates.iter().enumerate() {
        match envelope.open(&candidate.keypair) {
            Ok(plaintext) => return Ok((plaintext, index)),
            Err(_) => {
                tracing::debug!(key = %candidate.label, "candidate key did not open ciphertext");
            }
        }
    }
    Err(CipherError::DecryptionFailure)
}

/// Resolves raw ledger bytes to plaintext balances.
#[derive(Debug, Clone, Copy)]
pub struct BalanceResolver<'k> {
    candidates: &'k [CandidateKey],
    policy: UndecryptablePolicy,
}

impl<'k> BalanceResolver<'k> {
    pub fn new(candidates: &'k [CandidateKey], policy: UndecryptablePolicy) -> Self {
        Self { candidates, policy }
    }

    pub fn policy(&self) -> UndecryptablePolicy {
        self.policy
    }

    /// Resolve `raw` (the stored ciphertext for `account`) to a balance.
    ///
    /// # Errors
    ///
    /// - `CorruptBalance` if a candidate opens the ciphertext but the
    ///   plaintext is not a non-negative number.
    /// - `BalanceOutOfRange` if it is one, but not exactly representable.
    /// - `UndecryptableBalance` if no candidate opens a non-empty ciphertext
    ///   and the policy is [`UndecryptablePolicy::Reject`].
    pub fn resolve(&self, account: &Account, raw: &[u8]) -> Result<ResolvedBalance, BalanceError> {
        if raw.is_empty() {
            tracing::info!(%account, "balance is empty (uninitialized), resolving to 0");
            return Ok(ResolvedBalance::zero(BalanceOrigin::Uninitialized));
        }

        match decrypt_with_candidates(self.candidates, raw) {
            Ok((plaintext, key_index)) => {
                let amount = parse_balance(&plaintext).map_err(|e| match e {
                    AmountError::OutOfRange => BalanceError::BalanceOutOfRange {
                        account: account.to_string(),
                    },
                    AmountError::Malformed | AmountError::Negative => BalanceError::CorruptBalance {
                        account: account.to_string(),
                    },
                })?;
                let key_label = self.candidates[key_index].label.clone();
                tracing::info!(%account, %amount, key = %key_label, "balance decrypted");
                Ok(ResolvedBalance {
                    amount,
                    origin: BalanceOrigin::Decrypted {
                        key_index,
                        key_label,
                    },
                })
            }
            Err(reason) => match self.policy {
                UndecryptablePolicy::TreatAsZero => {
                    tracing::warn!(
                        %account,
                        bytes = raw.len(),
                        %reason,
                        "stored balance could not be decrypted with any candidate key, treating as 0"
                    );
                    Ok(ResolvedBalance::zero(BalanceOrigin::Undecryptable {
                        reason: reason.to_string(),
                    }))
                }
                UndecryptablePolicy::Reject => Err(BalanceError::UndecryptableBalance {
                    account: account.to_string(),
                    source: reason,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::crypto::ecies;

    fn account(s: &str) -> Account {
        Account::new(s)
    }

    fn keys() -> (CandidateKey, CandidateKey) {
        (
            CandidateKey::new("app", CloakKeypair::generate()),
            CandidateKey::new("ledger", CloakKeypair::generate()),
        )
    }

    fn seal(key: &CandidateKey, text: &str) -> Vec<u8> {
        ecies::encrypt(&key.keypair().public_key(), text.as_bytes()).unwrap()
    }

    #[test]
    fn test_empty_bytes_resolve_to_zero_without_keys() {
        // No candidates at all: if the resolver tried to decrypt, it could
        // only fail. Getting a clean zero proves it never did.
        let resolver = BalanceResolver::new(&[], UndecryptablePolicy::Reject);
        let resolved = resolver.resolve(&account("0xabc"), &[]).unwrap();
        assert_eq!(resolved.amount, Decimal::ZERO);
        assert_eq!(resolved.origin, BalanceOrigin::Uninitialized);
        assert_eq!(resolved.used_key(), None);
        assert!(!resolved.is_anomalous());
    }

    #[test]
    fn test_first_candidate_wins() {
        let (app, ledger) = keys();
        let candidates = vec![app.clone(), ledger];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::Reject);
        let resolved = resolver.resolve(&account("a"), &seal(&app, "150")).unwrap();
        assert_eq!(resolved.amount, Decimal::from(150));
        assert_eq!(resolved.used_key(), Some(0));
    }

    #[test]
    fn test_falls_back_to_second_candidate() {
        let (app, ledger) = keys();
        let candidates = vec![app, ledger.clone()];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::Reject);
        let resolved = resolver.resolve(&account("a"), &seal(&ledger, "20.5")).unwrap();
        assert_eq!(resolved.amount, Decimal::from_str("20.5").unwrap());
        assert_eq!(
            resolved.origin,
            BalanceOrigin::Decrypted {
                key_index: 1,
                key_label: "ledger".into()
            }
        );
    }

    #[test]
    fn test_all_candidates_fail_treat_as_zero() {
        let (app, ledger) = keys();
        let stranger = CandidateKey::new("stranger", CloakKeypair::generate());
        let candidates = vec![app, ledger];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::TreatAsZero);
        let resolved = resolver.resolve(&account("a"), &seal(&stranger, "99")).unwrap();
        assert_eq!(resolved.amount, Decimal::ZERO);
        assert!(resolved.is_anomalous());
        assert_eq!(resolved.used_key(), None);
    }

    #[test]
    fn test_all_candidates_fail_reject() {
        let (app, _) = keys();
        let stranger = CandidateKey::new("stranger", CloakKeypair::generate());
        let candidates = vec![app];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::Reject);
        let err = resolver.resolve(&account("a"), &seal(&stranger, "99")).unwrap_err();
        assert!(matches!(
            err,
            BalanceError::UndecryptableBalance {
                source: CipherError::DecryptionFailure,
                ..
            }
        ));
    }

    #[test]
    fn test_short_garbage_follows_policy() {
        let (app, _) = keys();
        let candidates = vec![app];
        let lenient = BalanceResolver::new(&candidates, UndecryptablePolicy::TreatAsZero);
        let resolved = lenient.resolve(&account("a"), &[1, 2, 3]).unwrap();
        assert!(resolved.is_anomalous());

        let strict = BalanceResolver::new(&candidates, UndecryptablePolicy::Reject);
        assert!(matches!(
            strict.resolve(&account("a"), &[1, 2, 3]),
            Err(BalanceError::UndecryptableBalance {
                source: CipherError::TooShortCiphertext(3),
                ..
            })
        ));
    }

    #[test]
    fn test_non_numeric_plaintext_is_corrupt_under_both_policies() {
        let (app, _) = keys();
        let candidates = vec![app.clone()];
        for policy in [UndecryptablePolicy::TreatAsZero, UndecryptablePolicy::Reject] {
            let resolver = BalanceResolver::new(&candidates, policy);
            let err = resolver.resolve(&account("a"), &seal(&app, "lots")).unwrap_err();
            assert!(matches!(err, BalanceError::CorruptBalance { .. }));
        }
    }

    #[test]
    fn test_negative_plaintext_is_corrupt() {
        let (app, _) = keys();
        let candidates = vec![app.clone()];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::TreatAsZero);
        let err = resolver.resolve(&account("a"), &seal(&app, "-5")).unwrap_err();
        assert!(matches!(err, BalanceError::CorruptBalance { .. }));
    }

    #[test]
    fn test_unrepresentable_plaintext_is_out_of_range() {
        let (app, _) = keys();
        let candidates = vec![app.clone()];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::TreatAsZero);
        for text in ["0.00000000000000000000000000001", "1e29"] {
            let err = resolver.resolve(&account("a"), &seal(&app, text)).unwrap_err();
            assert!(matches!(err, BalanceError::BalanceOutOfRange { .. }), "{text}");
        }
    }

    #[test]
    fn test_separators_and_plus_sign_are_corrupt() {
        let (app, _) = keys();
        let candidates = vec![app.clone()];
        let resolver = BalanceResolver::new(&candidates, UndecryptablePolicy::TreatAsZero);
        for text in ["1_000", "+5"] {
            let err = resolver.resolve(&account("a"), &seal(&app, text)).unwrap_err();
            assert!(matches!(err, BalanceError::CorruptBalance { .. }), "{text}");
        }
    }

    #[test]
    fn test_decrypt_with_no_candidates_fails() {
        let (app, _) = keys();
        assert_eq!(
            decrypt_with_candidates(&[], &seal(&app, "1")),
            Err(CipherError::DecryptionFailure)
        );
    }
}
