//! Element encoding

use crate::element::Element;
use byteorder::{BigEndian, ByteOrder};
use strata_core::{escape_nul_into, NUL_ESCAPE};

pub(crate) const NULL_CODE: u8 = 0x00;
pub(crate) const BYTES_CODE: u8 = 0x01;
pub(crate) const STRING_CODE: u8 = 0x02;
pub(crate) const NESTED_CODE: u8 = 0x05;
pub(crate) const NEG_INT_MIN_CODE: u8 = 0x0C;
pub(crate) const INT_ZERO_CODE: u8 = 0x14;
pub(crate) const POS_INT_MAX_CODE: u8 = 0x1C;
pub(crate) const FLOAT_CODE: u8 = 0x20;
pub(crate) const DOUBLE_CODE: u8 = 0x21;
pub(crate) const FALSE_CODE: u8 = 0x26;
pub(crate) const TRUE_CODE: u8 = 0x27;
pub(crate) const UUID_CODE: u8 = 0x30;

/// Terminates byte strings, strings and nested tuples
pub(crate) const TERMINATOR: u8 = 0x00;

const F32_SIGN: u32 = 0x8000_0000;
const F64_SIGN: u64 = 0x8000_0000_0000_0000;

/// Append the encoding of `element` to `buf`
///
/// Inside a nested tuple a `Null` is written as `0x00 0xFF` so it cannot be
/// mistaken for the nested terminator.
pub(crate) fn encode_element(element: &Element, buf: &mut Vec<u8>, nested: bool) {
    match element {
        Element::Null => {
            buf.push(NULL_CODE);
            if nested {
                buf.push(NUL_ESCAPE);
            }
        }
        Element::Bytes(bytes) => {
            buf.push(BYTES_CODE);
            escape_nul_into(bytes.as_bytes(), buf);
            buf.push(TERMINATOR);
        }
        Element::String(s) => {
            buf.push(STRING_CODE);
            escape_nul_into(s.as_bytes(), buf);
            buf.push(TERMINATOR);
        }
        Element::Int(n) => encode_int(*n, buf),
        Element::Float(v) => {
            buf.push(FLOAT_CODE);
            let mut raw = [0u8; 4];
            BigEndian::write_u32(&mut raw, encode_f32_bits(*v));
            buf.extend_from_slice(&raw);
        }
        Element::Double(v) => {
            buf.push(DOUBLE_CODE);
            let mut raw = [0u8; 8];
            BigEndian::write_u64(&mut raw, encode_f64_bits(*v));
            buf.extend_from_slice(&raw);
        }
        Element::Bool(false) => buf.push(FALSE_CODE),
        Element::Bool(true) => buf.push(TRUE_CODE),
        Element::Uuid(u) => {
            buf.push(UUID_CODE);
            buf.extend_from_slice(u.as_bytes());
        }
        Element::Tuple(t) => {
            buf.push(NESTED_CODE);
            for inner in t.iter() {
                encode_element(inner, buf, true);
            }
            buf.push(TERMINATOR);
        }
    }
}

/// Exact number of bytes `encode_element` writes for `element`
pub(crate) fn encoded_len(element: &Element, nested: bool) -> usize {
    match element {
        Element::Null => {
            if nested {
                2
            } else {
                1
            }
        }
        Element::Bytes(bytes) => 2 + escaped_len(bytes.as_bytes()),
        Element::String(s) => 2 + escaped_len(s.as_bytes()),
        Element::Int(0) => 1,
        Element::Int(n) => 1 + magnitude_len(n.unsigned_abs()),
        Element::Float(_) => 5,
        Element::Double(_) => 9,
        Element::Bool(_) => 1,
        Element::Uuid(_) => 17,
        Element::Tuple(t) => 2 + t.iter().map(|e| encoded_len(e, true)).sum::<usize>(),
    }
}

/// Integers: `0x14` for zero, otherwise a code offset by the magnitude's byte
/// width followed by the big-endian magnitude (one's complement for negatives)
fn encode_int(n: i64, buf: &mut Vec<u8>) {
    if n == 0 {
        buf.push(INT_ZERO_CODE);
        return;
    }

    let magnitude = n.unsigned_abs();
    let size = magnitude_len(magnitude);
    let mut raw = [0u8; 8];
    if n > 0 {
        buf.push(INT_ZERO_CODE + size as u8);
        BigEndian::write_u64(&mut raw, magnitude);
    } else {
        buf.push(INT_ZERO_CODE - size as u8);
        BigEndian::write_u64(&mut raw, !magnitude);
    }
    buf.extend_from_slice(&raw[8 - size..]);
}

/// Bytes needed to hold a non-zero magnitude
pub(crate) fn magnitude_len(magnitude: u64) -> usize {
    (64 - magnitude.leading_zeros() as usize + 7) / 8
}

fn escaped_len(bytes: &[u8]) -> usize {
    bytes.len() + bytes.iter().filter(|&&b| b == 0x00).count()
}

/// Flip the sign bit of positives and every bit of negatives so the bit
/// patterns sort like the values
pub(crate) fn encode_f32_bits(v: f32) -> u32 {
    let bits = v.to_bits();
    if bits & F32_SIGN != 0 {
        !bits
    } else {
        bits ^ F32_SIGN
    }
}

pub(crate) fn decode_f32_bits(encoded: u32) -> f32 {
    let bits = if encoded & F32_SIGN != 0 {
        encoded ^ F32_SIGN
    } else {
        !encoded
    };
    f32::from_bits(bits)
}

pub(crate) fn encode_f64_bits(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & F64_SIGN != 0 {
        !bits
    } else {
        bits ^ F64_SIGN
    }
}

pub(crate) fn decode_f64_bits(encoded: u64) -> f64 {
    let bits = if encoded & F64_SIGN != 0 {
        encoded ^ F64_SIGN
    } else {
        !encoded
    };
    f64::from_bits(bits)
}
