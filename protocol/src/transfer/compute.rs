//! The transfer arithmetic.
//!
//! Pure functions over plaintext decimals. Nothing here knows about keys,
//! ciphertexts or chains, which is what makes the money part easy to test.

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::TransferError;
use crate::balance::amount::{parse_decimal, AmountError};

/// Balances on both sides of a successful transfer computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub amount: Decimal,
    pub sender_previous: Decimal,
    pub receiver_previous: Decimal,
    pub sender_new: Decimal,
    pub receiver_new: Decimal,
}

/// Parse a decrypted transfer amount. Must be a number strictly greater
/// than zero that a `Decimal` holds exactly.
pub fn parse_transfer_amount(plaintext: &[u8]) -> Result<Decimal, TransferError> {
    let amount = parse_decimal(plaintext).map_err(|e| match e {
        AmountError::OutOfRange => TransferError::AmountOutOfRange,
        AmountError::Malformed | AmountError::Negative => TransferError::InvalidAmount,
    })?;
    if amount <= Decimal::ZERO {
        return Err(TransferError::InvalidAmount);
    }
    Ok(amount)
}

/// Move `amount` from the sender to the receiver.
///
/// # Errors
///
/// - `InvalidAmount` if `amount <= 0`.
/// - `InsufficientBalance` if the sender holds less than `amount`.
/// - `ArithmeticInvariantViolation` on negative inputs, overflow, a
///   negative result, or if the total isn't conserved.
pub fn compute_transfer(
    amount: Decimal,
    sender_balance: Decimal,
    receiver_balance: Decimal,
) -> Result<TransferOutcome, TransferError> {
    if amount <= Decimal::ZERO {
        return Err(TransferError::InvalidAmount);
    }
    if sender_balance < Decimal::ZERO || receiver_balance < Decimal::ZERO {
        return Err(TransferError::ArithmeticInvariantViolation(
            "prior balance is negative".into(),
        ));
    }
    if sender_balance < amount {
        return Err(TransferError::InsufficientBalance {
            available: sender_balance,
            requested: amount,
        });
    }

    let overflow = || TransferError::ArithmeticInvariantViolation("arithmetic overflow".into());
    let sender_new = sender_balance.checked_sub(amount).ok_or_else(overflow)?;
    let receiver_new = receiver_balance.checked_add(amount).ok_or_else(overflow)?;

    if sender_new < Decimal::ZERO || receiver_new < Decimal::ZERO {
        return Err(TransferError::ArithmeticInvariantViolation(
            "new balance is negative".into(),
        ));
    }

    let before = sender_balance.checked_add(receiver_balance).ok_or_else(overflow)?;
    let after = sender_new.checked_add(receiver_new).ok_or_else(overflow)?;
    if before != after {
        return Err(TransferError::ArithmeticInvariantViolation(
            "total balance not conserved".into(),
        ));
    }

    Ok(TransferOutcome {
        amount,
        sender_previous: sender_balance,
        receiver_previous: receiver_balance,
        sender_new,
        receiver_new,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_basic_transfer() {
        let out = compute_transfer(dec("30"), dec("150"), dec("20")).unwrap();
        assert_eq!(out.sender_new, dec("120"));
        assert_eq!(out.receiver_new, dec("50"));
    }

    #[test]
    fn test_conservation_with_fractions() {
        let cases = [
            ("0.1", "0.3", "0.2"),
            ("1.005", "10", "0"),
            ("3.333333", "7.5", "1000000.000001"),
        ];
        for (amount, sender, receiver) in cases {
            let out = compute_transfer(dec(amount), dec(sender), dec(receiver)).unwrap();
            assert_eq!(
                out.sender_new + out.receiver_new,
                dec(sender) + dec(receiver),
                "conservation broken for {amount} / {sender} / {receiver}"
            );
        }
    }

    #[test]
    fn test_insufficient_balance() {
        assert_eq!(
            compute_transfer(dec("100"), dec("50"), dec("0")),
            Err(TransferError::InsufficientBalance {
                available: dec("50"),
                requested: dec("100"),
            })
        );
    }

    #[test]
    fn test_sending_everything_leaves_zero() {
        let out = compute_transfer(dec("50"), dec("50"), dec("0")).unwrap();
        assert!(out.sender_new.is_zero());
        assert_eq!(out.receiver_new, dec("50"));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert_eq!(
            compute_transfer(Decimal::ZERO, dec("10"), dec("0")),
            Err(TransferError::InvalidAmount)
        );
        assert_eq!(
            compute_transfer(dec("-1"), dec("10"), dec("0")),
            Err(TransferError::InvalidAmount)
        );
    }

    #[test]
    fn test_negative_prior_balance_is_an_invariant_violation() {
        assert!(matches!(
            compute_transfer(dec("1"), dec("10"), dec("-1")),
            Err(TransferError::ArithmeticInvariantViolation(_))
        ));
    }

    #[test]
    fn test_receiver_overflow() {
        assert!(matches!(
            compute_transfer(dec("1"), dec("1"), Decimal::MAX),
            Err(TransferError::ArithmeticInvariantViolation(_))
        ));
    }

    #[test]
    fn test_parse_transfer_amount() {
        assert_eq!(parse_transfer_amount(b"30").unwrap(), dec("30"));
        assert_eq!(parse_transfer_amount(b"1e2").unwrap(), dec("100"));
        assert_eq!(parse_transfer_amount(b"0"), Err(TransferError::InvalidAmount));
        assert_eq!(parse_transfer_amount(b"-5"), Err(TransferError::InvalidAmount));
        assert_eq!(parse_transfer_amount(b"ten"), Err(TransferError::InvalidAmount));
        assert_eq!(parse_transfer_amount(b"+5"), Err(TransferError::InvalidAmount));
        assert_eq!(parse_transfer_amount(b"1_000"), Err(TransferError::InvalidAmount));
    }

    #[test]
    fn test_unrepresentable_amount_is_out_of_range() {
        assert_eq!(
            parse_transfer_amount(b"0.00000000000000000000000000001"),
            Err(TransferError::AmountOutOfRange)
        );
        assert_eq!(parse_transfer_amount(b"1e29"), Err(TransferError::AmountOutOfRange));
        assert_eq!(
            parse_transfer_amount(b"100000000000000000000000000000"),
            Err(TransferError::AmountOutOfRange)
        );
    }

    // Amounts and balances in cents, so fractional values get exercised too.
    fn cents(n: u32) -> Decimal {
        Decimal::new(i64::from(n), 2)
    }

    #[quickcheck]
    fn total_is_conserved(amount: u32, sender: u32, receiver: u32) -> bool {
        let (amount, sender, receiver) = (cents(amount), cents(sender), cents(receiver));
        match compute_transfer(amount, sender, receiver) {
            Ok(out) => {
                out.sender_new + out.receiver_new == sender + receiver
                    && out.sender_new >= Decimal::ZERO
                    && out.receiver_new == receiver + amount
            }
            Err(TransferError::InvalidAmount) => amount.is_zero(),
            Err(TransferError::InsufficientBalance { .. }) => sender < amount,
            Err(_) => false,
        }
    }

    #[quickcheck]
    fn insufficient_balance_boundary(amount: u32, receiver: u32) -> TestResult {
        if amount == 0 {
            return TestResult::discard();
        }
        let (amount, receiver) = (cents(amount), cents(receiver));
        let exact = compute_transfer(amount, amount, receiver);
        let one_short = compute_transfer(amount, amount - cents(1), receiver);
        TestResult::from_bool(
            matches!(exact, Ok(out) if out.sender_new.is_zero())
                && matches!(one_short, Err(TransferError::InsufficientBalance { .. })),
        )
    }
}
