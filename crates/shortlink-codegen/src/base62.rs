//! Base-62 encoding of arbitrary byte strings.

use shortlink_core::{CodeLength, ShortCode, ALPHABET};

const BASE: u32 = 62;

/// Encodes `bytes` as a big-endian unsigned integer in base 62.
///
/// Most significant digit first. Empty or all-zero input yields `"0"`.
pub fn encode(bytes: &[u8]) -> String {
    // Remaining dividend as base-256 digits, without leading zeros.
    let mut dividend: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
    if dividend.is_empty() {
        return char::from(ALPHABET[0]).to_string();
    }

    let mut digits = Vec::with_capacity(bytes.len() * 4 / 3 + 1);
    while !dividend.is_empty() {
        let mut remainder = 0_u32;
        let mut quotient = Vec::with_capacity(dividend.len());
        for &byte in &dividend {
            let acc = remainder * 256 + u32::from(byte);
            let q = acc / BASE;
            remainder = acc % BASE;
            if !quotient.is_empty() || q != 0 {
                // acc < 62 * 256, so q <= 255
                quotient.push(q as u8);
            }
        }
        digits.push(ALPHABET[remainder as usize]);
        dividend = quotient;
    }

    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// Forces `s` to exactly `length` characters.
///
/// Longer input keeps its leading `length` characters; shorter input is
/// left-padded with the zero digit.
pub fn clamp(s: &str, length: usize) -> String {
    let current = s.chars().count();
    if current >= length {
        return s.chars().take(length).collect();
    }

    let mut out = String::with_capacity(length);
    out.extend(std::iter::repeat_n(char::from(ALPHABET[0]), length - current));
    out.push_str(s);
    out
}

/// Encodes and clamps `bytes` into a short code of the given length.
pub fn to_code(bytes: &[u8], length: CodeLength) -> ShortCode {
    ShortCode::new_unchecked(clamp(&encode(bytes), length.get()))
}
