//! Plaintext amounts: the text that lives inside a ciphertext.
//!
//! Balances and transfer amounts are sealed as UTF-8 decimal strings
//! (`"150"`, `"0.25"`). We parse them into `rust_decimal::Decimal` rather
//! than a float so that `sender + receiver` is conserved exactly across a
//! transfer. No `0.1 + 0.2` surprises with other people's money.
//!
//! The accepted grammar is strict:
//!
//! ```text
//! amount   = ["-"] digits ["." digits] [("e" | "E") ["+" | "-"] digits]
//! digits   = 1*("0".."9")
//! ```
//!
//! Surrounding whitespace is ignored. Everything is parsed exactly: a value
//! that would need rounding to fit a `Decimal` (more than 28 fractional
//! digits, more significant digits than 96 bits hold, or a magnitude above
//! `Decimal::MAX`) is [`AmountError::OutOfRange`], never silently rounded.

use rust_decimal::Decimal;
use thiserror::Error;

/// Why a plaintext is not an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("not a decimal number")]
    Malformed,

    #[error("number cannot be represented exactly")]
    OutOfRange,

    #[error("negative amount")]
    Negative,
}

/// Exponents this large can only describe out-of-range values (or zero), so
/// there is no point in reading more digits of them.
const MAX_EXPONENT_DIGITS: usize = 6;

/// Largest number of integer digits a `Decimal` can have.
const MAX_INTEGER_DIGITS: i64 = 29;

/// Largest scale a `Decimal` can have.
const MAX_SCALE: i64 = 28;

/// A syntactically valid amount literal, not yet range-checked.
#[derive(Debug, PartialEq, Eq)]
struct Literal<'a> {
    negative: bool,
    integer: &'a str,
    fraction: &'a str,
    exponent: i64,
}

impl<'a> Literal<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (mantissa, exponent) = match rest.find(|c: char| c == 'e' || c == 'E') {
            Some(at) => (&rest[..at], parse_exponent(&rest[at + 1..])?),
            None => (rest, 0),
        };
        let (integer, fraction) = match mantissa.split_once('.') {
            Some((integer, fraction)) if is_digits(fraction) => (integer, fraction),
            Some(_) => return None,
            None => (mantissa, ""),
        };
        if !is_digits(integer) {
            return None;
        }
        Some(Self {
            negative,
            integer,
            fraction,
            exponent,
        })
    }

    /// Rewrite as plain positional notation with no exponent and no
    /// redundant zeros, ready for an exact parse.
    fn to_plain(&self) -> Result<String, AmountError> {
        let digits = format!("{}{}", self.integer, self.fraction);
        let leading_zeros = digits.len() - digits.trim_start_matches('0').len();
        let significant = digits[leading_zeros..].trim_end_matches('0');
        if significant.is_empty() {
            return Ok("0".to_string());
        }

        // Position of the decimal point, counted from the first significant
        // digit. Trailing zeros of `digits` that sit left of the point are
        // restored by the padding below.
        let point = self.integer.len() as i64 - leading_zeros as i64 + self.exponent;
        if point > MAX_INTEGER_DIGITS || point + MAX_SCALE < 1 {
            return Err(AmountError::OutOfRange);
        }

        let mut plain = String::with_capacity(significant.len() + 32);
        if self.negative {
            plain.push('-');
        }
        if point <= 0 {
            plain.push_str("0.");
            plain.extend(std::iter::repeat('0').take(point.unsigned_abs() as usize));
            plain.push_str(significant);
        } else {
            let point = point as usize;
            if point >= significant.len() {
                plain.push_str(significant);
                plain.extend(std::iter::repeat('0').take(point - significant.len()));
            } else {
                plain.push_str(&significant[..point]);
                plain.push('.');
                plain.push_str(&significant[point..]);
            }
        }
        Ok(plain)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_exponent(s: &str) -> Option<i64> {
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if !is_digits(digits) {
        return None;
    }
    let significant = digits.trim_start_matches('0');
    let magnitude = if significant.len() > MAX_EXPONENT_DIGITS {
        10_i64.pow(MAX_EXPONENT_DIGITS as u32)
    } else {
        significant.parse::<i64>().unwrap_or(0)
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse decrypted bytes into a decimal quantity, exactly.
///
/// Scientific notation (`"1e3"`) is accepted for writers that serialized
/// floats. Non-UTF-8 bytes, `NaN`, `Infinity`, digit separators and a
/// leading `+` are all [`AmountError::Malformed`].
pub fn parse_decimal(bytes: &[u8]) -> Result<Decimal, AmountError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| AmountError::Malformed)?
        .trim();
    let plain = Literal::parse(text).ok_or(AmountError::Malformed)?.to_plain()?;
    Decimal::from_str_exact(&plain).map_err(|_| AmountError::OutOfRange)
}

/// Parse a stored balance: any amount `>= 0`.
pub fn parse_balance(bytes: &[u8]) -> Result<Decimal, AmountError> {
    let value = parse_decimal(bytes)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative);
    }
    Ok(value)
}

/// Canonical text form for sealing: no trailing zeros, no exponent.
///
/// `120.00` seals as `"120"`, `0.50` as `"0.5"`.
pub fn format_amount(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use quickcheck_macros::quickcheck;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain_integers_and_fractions() {
        assert_eq!(parse_decimal(b"100"), Ok(dec("100")));
        assert_eq!(parse_decimal(b"0.25"), Ok(dec("0.25")));
        assert_eq!(parse_decimal(b"  42\n"), Ok(dec("42")));
        assert_eq!(parse_decimal(b"007.500"), Ok(dec("7.5")));
        assert_eq!(parse_decimal(b"-3"), Ok(dec("-3")));
    }

    #[test]
    fn test_parse_scientific() {
        assert_eq!(parse_decimal(b"1e3"), Ok(dec("1000")));
        assert_eq!(parse_decimal(b"2.5E-1"), Ok(dec("0.25")));
        assert_eq!(parse_decimal(b"1.5e+2"), Ok(dec("150")));
        assert_eq!(parse_decimal(b"0e999999999"), Ok(Decimal::ZERO));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            &b""[..],
            b"abc",
            b"NaN",
            b"Infinity",
            b"12abc",
            b"1_000",
            b"+5",
            b".5",
            b"5.",
            b"1e",
            b"--1",
            b"1 000",
            &[0xff_u8, 0xfe][..],
        ] {
            assert_eq!(
                parse_decimal(bad),
                Err(AmountError::Malformed),
                "{:?}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn test_excess_precision_is_not_rounded_away() {
        // 29 fractional digits: from_str would round this to zero.
        assert_eq!(
            parse_decimal(b"0.00000000000000000000000000001"),
            Err(AmountError::OutOfRange)
        );
        assert_eq!(parse_decimal(b"1e-29"), Err(AmountError::OutOfRange));
        assert_eq!(
            parse_decimal(b"0.0000000000000000000000000001"),
            Ok(Decimal::new(1, 28))
        );
        // Trailing zeros past the scale limit carry no information.
        assert_eq!(
            parse_decimal(b"1.000000000000000000000000000000000"),
            Ok(Decimal::ONE)
        );
        // Too many significant digits for the 96-bit mantissa.
        assert_eq!(
            parse_decimal(b"12.0000000000000000000000000001"),
            Err(AmountError::OutOfRange)
        );
    }

    #[test]
    fn test_magnitude_above_max_is_out_of_range() {
        assert_eq!(parse_decimal(b"1e29"), Err(AmountError::OutOfRange));
        assert_eq!(
            parse_decimal(b"100000000000000000000000000000"),
            Err(AmountError::OutOfRange)
        );
        assert_eq!(
            parse_decimal(b"79228162514264337593543950336"),
            Err(AmountError::OutOfRange)
        );
        assert_eq!(
            parse_decimal(b"79228162514264337593543950335"),
            Ok(Decimal::MAX)
        );
        assert_eq!(parse_decimal(b"1e9999999999"), Err(AmountError::OutOfRange));
    }

    #[test]
    fn test_balance_must_be_non_negative() {
        assert_eq!(parse_balance(b"0"), Ok(Decimal::ZERO));
        assert_eq!(parse_balance(b"-0"), Ok(Decimal::ZERO));
        assert_eq!(parse_balance(b"-1"), Err(AmountError::Negative));
        assert_eq!(parse_balance(b"-0.0001"), Err(AmountError::Negative));
        assert_eq!(parse_balance(b"1e40"), Err(AmountError::OutOfRange));
    }

    #[test]
    fn test_format_is_normalized() {
        assert_eq!(format_amount(dec("120.00")), "120");
        assert_eq!(format_amount(dec("0.50")), "0.5");
        assert_eq!(format_amount(Decimal::ZERO), "0");
    }

    #[quickcheck]
    fn sealed_text_parses_back_to_the_same_amount(mantissa: i64, scale: u32) -> bool {
        let value = Decimal::new(mantissa, scale % 29);
        parse_decimal(format_amount(value).as_bytes()) == Ok(value)
    }
}
