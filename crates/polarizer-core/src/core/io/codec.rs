//! Encoding of particle and residue indices that outgrow their fixed-width PDB fields.
//!
//! Values that fit the field are written as plain decimal. Larger values switch to an
//! upper-case base-36 representation whose first digit is always a letter, so the
//! smallest over-limit value of a five-character field is `A0000`. Because no extended
//! token is made of digits only, a reader can tell the two regimes apart without any
//! side information besides the field width.

use thiserror::Error;

/// Width of the particle serial field (columns 7-11).
pub const SERIAL_WIDTH: usize = 5;
/// Width of the residue sequence field (columns 23-26).
pub const RESIDUE_SEQ_WIDTH: usize = 4;

const RADIX: u128 = 36;
const LETTER_OFFSET: u128 = 10;
const LETTER_COUNT: u128 = 26;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Empty index token")]
    Empty,
    #[error("Invalid character '{character}' in index token '{token}'")]
    InvalidDigit { token: String, character: char },
    #[error("Extended index token '{token}' must start with a letter")]
    MissingLetterPrefix { token: String },
    #[error("Extended index token '{token}' is shorter than the field width {width}")]
    TooShort { token: String, width: usize },
    #[error("Index token '{token}' is out of range")]
    Overflow { token: String },
}

fn decimal_limit(width: usize) -> u128 {
    10u128.pow(width as u32)
}

/// Number of letter-led tokens of exactly `len` base-36 digits.
fn block_size(len: usize) -> u128 {
    LETTER_COUNT * RADIX.pow(len as u32 - 1)
}

/// Encodes `value` for a field of `width` characters.
///
/// The returned token is only wider than `width` once every letter-led token of that
/// width is used up; callers writing fixed columns must check the length.
pub fn encode(value: usize, width: usize) -> String {
    let limit = decimal_limit(width);
    let value = value as u128;
    if value < limit {
        return value.to_string();
    }

    let mut excess = value - limit;
    let mut len = width.max(1);
    while excess >= block_size(len) {
        excess -= block_size(len);
        len += 1;
    }

    let mut number = LETTER_OFFSET * RADIX.pow(len as u32 - 1) + excess;
    let mut digits = vec![b'0'; len];
    for slot in digits.iter_mut().rev() {
        let digit = (number % RADIX) as u32;
        *slot = char::from_digit(digit, RADIX as u32)
            .map(|c| c.to_ascii_uppercase() as u8)
            .unwrap_or(b'0');
        number /= RADIX;
    }
    String::from_utf8_lossy(&digits).into_owned()
}

/// Decodes a token produced by [`encode`] for a field of `width` characters.
///
/// Surrounding whitespace is ignored. Tokens made of decimal digits only are read as
/// plain decimal; anything else must be a letter-led base-36 token.
pub fn decode(token: &str, width: usize) -> Result<usize, CodecError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CodecError::Empty);
    }

    if token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse::<usize>().map_err(|_| CodecError::Overflow {
            token: token.to_string(),
        });
    }

    let first = token.chars().next().unwrap_or('0');
    if !first.is_ascii_alphabetic() {
        return Err(CodecError::MissingLetterPrefix {
            token: token.to_string(),
        });
    }
    let len = token.chars().count();
    if len < width.max(1) {
        return Err(CodecError::TooShort {
            token: token.to_string(),
            width,
        });
    }

    let overflow = || CodecError::Overflow {
        token: token.to_string(),
    };

    let mut number: u128 = 0;
    for character in token.chars() {
        let digit = character
            .to_digit(RADIX as u32)
            .ok_or_else(|| CodecError::InvalidDigit {
                token: token.to_string(),
                character,
            })?;
        number = number
            .checked_mul(RADIX)
            .and_then(|n| n.checked_add(digit as u128))
            .ok_or_else(overflow)?;
    }

    let mut value = decimal_limit(width) + number - LETTER_OFFSET * RADIX.pow(len as u32 - 1);
    for shorter in width.max(1)..len {
        value = value.checked_add(block_size(shorter)).ok_or_else(overflow)?;
    }
    usize::try_from(value).map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_below_limit_are_plain_decimal() {
        assert_eq!(encode(0, SERIAL_WIDTH), "0");
        assert_eq!(encode(42, SERIAL_WIDTH), "42");
        assert_eq!(encode(99_999, SERIAL_WIDTH), "99999");
        assert_eq!(encode(9_999, RESIDUE_SEQ_WIDTH), "9999");
    }

    #[test]
    fn first_over_limit_value_maps_to_letter_followed_by_zeros() {
        assert_eq!(encode(100_000, SERIAL_WIDTH), "A0000");
        assert_eq!(encode(100_001, SERIAL_WIDTH), "A0001");
        assert_eq!(encode(10_000, RESIDUE_SEQ_WIDTH), "A000");
        assert_eq!(encode(10_035, RESIDUE_SEQ_WIDTH), "A00Z");
        assert_eq!(encode(10_036, RESIDUE_SEQ_WIDTH), "A010");
    }

    #[test]
    fn last_token_of_field_width_is_all_z() {
        let last = 100_000 + 26 * 36usize.pow(4) - 1;
        assert_eq!(encode(last, SERIAL_WIDTH), "ZZZZZ");
        assert_eq!(encode(last + 1, SERIAL_WIDTH), "A00000");
    }

    #[test]
    fn round_trip_holds_across_both_regimes() {
        for width in [RESIDUE_SEQ_WIDTH, SERIAL_WIDTH] {
            let limit = 10usize.pow(width as u32);
            let probes = (0..2_000)
                .chain(limit - 2_000..limit + 50_000)
                .chain([limit + 26 * 36usize.pow(width as u32 - 1) - 1])
                .chain([limit + 26 * 36usize.pow(width as u32 - 1)])
                .chain([usize::MAX / 4]);
            for value in probes {
                let token = encode(value, width);
                assert_eq!(decode(&token, width), Ok(value), "token {token}");
            }
        }
    }

    #[test]
    fn extended_tokens_never_consist_of_digits_only() {
        for value in (100_000..400_000).step_by(997) {
            let token = encode(value, SERIAL_WIDTH);
            assert!(token.chars().next().unwrap().is_ascii_uppercase());
        }
    }

    #[test]
    fn decode_accepts_padding_and_lowercase() {
        assert_eq!(decode("   12", SERIAL_WIDTH), Ok(12));
        assert_eq!(decode("a0001", SERIAL_WIDTH), Ok(100_001));
    }

    #[test]
    fn decode_rejects_malformed_tokens() {
        assert_eq!(decode("  ", SERIAL_WIDTH), Err(CodecError::Empty));
        assert!(matches!(
            decode("1A000", SERIAL_WIDTH),
            Err(CodecError::MissingLetterPrefix { .. })
        ));
        assert!(matches!(
            decode("A0-00", SERIAL_WIDTH),
            Err(CodecError::InvalidDigit { character: '-', .. })
        ));
        assert!(matches!(
            decode("A00", SERIAL_WIDTH),
            Err(CodecError::TooShort { .. })
        ));
    }
}
