//! Hex encoding at the process and wire boundary.
//!
//! Everything that crosses into Cloak as text (encrypted amounts, contract
//! return data, secrets) is hex with an optional `0x` prefix. Everything we
//! hand back to a chain node is `0x`-prefixed lowercase hex.

use thiserror::Error;

/// Malformed hex input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("invalid hex string: length must be even (got {0} characters)")]
    OddLength(usize),

    #[error("invalid hex string: unexpected character {character:?} at position {index}")]
    InvalidCharacter { character: char, index: usize },
}

/// Strip a single leading `0x` / `0X`, if present.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode hex with an optional `0x` prefix.
///
/// An empty string (or a bare `0x`) decodes to an empty byte vector. The
/// ledger uses that to signal "nothing stored".
pub fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    let clean = strip_hex_prefix(s.trim());
    hex::decode(clean).map_err(|e| match e {
        hex::FromHexError::OddLength => EncodingError::OddLength(clean.len()),
        hex::FromHexError::InvalidHexCharacter { c, index } => EncodingError::InvalidCharacter {
            character: c,
            index,
        },
        // Only produced by decode_to_slice, which we never call.
        hex::FromHexError::InvalidStringLength => EncodingError::OddLength(clean.len()),
    })
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn encode_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Truncated preview for logs. Ciphertexts run to hundreds of characters and
/// nobody reads past the first few.
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
