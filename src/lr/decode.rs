//! The compact string encoding used for serialized tables.
//!
//! Each value is written as base-46 digits, most significant first, using
//! printable ASCII from `' '` while skipping `'"'` and `'\\'` so the strings
//! can be embedded in source code without escaping. The last digit of a value
//! is offset by 46 to mark the end. `'~'` stands for `0xffff`. The first value
//! is the number of values that follow.

use crate::error::{ParseError, Result};

use super::constants::encode::{BASE, BIG_VAL, BIG_VAL_CODE, GAP1, GAP2, START};

/// Decode a base-46 table string.
pub fn decode_array(input: &str) -> Result<Vec<u32>> {
    let bytes = input.as_bytes();
    let mut array: Option<Vec<u32>> = None;
    let mut expected = 0usize;
    let mut pos = 0;
    while pos < bytes.len() {
        let mut value: u64 = 0;
        loop {
            let Some(&code) = bytes.get(pos) else {
                return Err(ParseError::decode(format!("unterminated value at {pos}")));
            };
            pos += 1;
            if code == BIG_VAL_CODE {
                value = u64::from(BIG_VAL);
                break;
            }
            let mut next = u32::from(code);
            if next >= GAP2 {
                next -= 1;
            }
            if next >= GAP1 {
                next -= 1;
            }
            let Some(mut digit) = next.checked_sub(START) else {
                return Err(ParseError::decode(format!("invalid character {code} at {}", pos - 1)));
            };
            let stop = digit >= BASE;
            if stop {
                digit -= BASE;
            }
            value = value * u64::from(BASE) + u64::from(digit);
            if value > u64::from(u32::MAX) {
                return Err(ParseError::decode("value out of range"));
            }
            if stop {
                break;
            }
        }
        match array.as_mut() {
            Some(array) => array.push(value as u32),
            None => {
                expected = value as usize;
                array = Some(Vec::with_capacity(expected));
            }
        }
    }
    let array = array.unwrap_or_default();
    if array.len() != expected {
        return Err(ParseError::decode(format!(
            "expected {expected} values, found {}",
            array.len()
        )));
    }
    Ok(array)
}

/// Decode a table whose values must fit in 16 bits.
pub fn decode_array_u16(input: &str) -> Result<Vec<u16>> {
    decode_array(input)?
        .into_iter()
        .map(|value| {
            u16::try_from(value).map_err(|_| ParseError::decode(format!("value {value} exceeds 16 bits")))
        })
        .collect()
}

/// Encode values in the format read by [`decode_array`].
pub fn encode_array(values: &[u32]) -> String {
    let mut out = String::new();
    encode_value(values.len() as u32, &mut out);
    for &value in values {
        encode_value(value, &mut out);
    }
    out
}

fn encode_value(value: u32, out: &mut String) {
    if value == BIG_VAL {
        out.push(char::from(BIG_VAL_CODE));
        return;
    }
    let mut digits = Vec::new();
    let mut rest = value;
    loop {
        digits.push(rest % BASE);
        rest /= BASE;
        if rest == 0 {
            break;
        }
    }
    for (i, &digit) in digits.iter().rev().enumerate() {
        let mut code = digit + START;
        if i == digits.len() - 1 {
            code += BASE;
        }
        if code >= GAP1 {
            code += 1;
        }
        if code >= GAP2 {
            code += 1;
        }
        out.push(char::from(code as u8));
    }
}
