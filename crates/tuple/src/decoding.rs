//! Element decoding
//!
//! Decoding works over a `ByteSlice` so byte-string elements without
//! embedded NULs come back as zero-copy views of the packed key.

use crate::element::Element;
use crate::encoding::{
    decode_f32_bits, decode_f64_bits, BYTES_CODE, DOUBLE_CODE, FALSE_CODE, FLOAT_CODE,
    INT_ZERO_CODE, NEG_INT_MIN_CODE, NESTED_CODE, NULL_CODE, POS_INT_MAX_CODE, STRING_CODE,
    TERMINATOR, TRUE_CODE, UUID_CODE,
};
use crate::error::TupleError;
use crate::tuple::Tuple;
use byteorder::{BigEndian, ByteOrder};
use strata_core::{ByteSlice, NUL_ESCAPE};
use uuid::Uuid;

/// Decode up to `max_elements` top-level elements
///
/// Returns the elements and the number of bytes consumed.
pub(crate) fn decode_elements(
    source: &ByteSlice,
    max_elements: usize,
) -> Result<(Vec<Element>, usize), TupleError> {
    let data_len = source.len();
    let mut elements = Vec::new();
    let mut offset = 0;

    while offset < data_len && elements.len() < max_elements {
        let (element, consumed) = decode_element(source, offset)?;
        elements.push(element);
        offset += consumed;
    }

    Ok((elements, offset))
}

/// Decode the element whose type code sits at `offset`
///
/// Returns the element and the bytes consumed, type code included.
fn decode_element(source: &ByteSlice, offset: usize) -> Result<(Element, usize), TupleError> {
    let data = source.as_bytes();
    let code = *data.get(offset).ok_or(TupleError::UnexpectedEnd { offset })?;

    match code {
        NULL_CODE => Ok((Element::Null, 1)),

        BYTES_CODE => {
            let (payload, consumed) = decode_escaped(source, offset)?;
            Ok((Element::Bytes(payload), consumed))
        }

        STRING_CODE => {
            let (payload, consumed) = decode_escaped(source, offset)?;
            let text = std::str::from_utf8(payload.as_bytes())
                .map_err(|_| TupleError::InvalidUtf8 { offset })?;
            Ok((Element::String(text.to_owned()), consumed))
        }

        NESTED_CODE => {
            let (tuple, consumed) = decode_nested(source, offset)?;
            Ok((Element::Tuple(tuple), consumed))
        }

        NEG_INT_MIN_CODE..=POS_INT_MAX_CODE => {
            let (n, consumed) = decode_int(data, offset)?;
            Ok((Element::Int(n), consumed))
        }

        FLOAT_CODE => {
            let raw = payload(data, offset, 4)?;
            Ok((Element::Float(decode_f32_bits(BigEndian::read_u32(raw))), 5))
        }

        DOUBLE_CODE => {
            let raw = payload(data, offset, 8)?;
            Ok((Element::Double(decode_f64_bits(BigEndian::read_u64(raw))), 9))
        }

        FALSE_CODE => Ok((Element::Bool(false), 1)),
        TRUE_CODE => Ok((Element::Bool(true), 1)),

        UUID_CODE => {
            let raw = payload(data, offset, 16)?;
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(raw);
            Ok((Element::Uuid(Uuid::from_bytes(bytes)), 17))
        }

        _ => Err(TupleError::UnknownTypeCode { code, offset }),
    }
}

/// Fixed-width payload following the type code at `offset`
fn payload(data: &[u8], offset: usize, len: usize) -> Result<&[u8], TupleError> {
    data.get(offset + 1..offset + 1 + len)
        .ok_or(TupleError::UnexpectedEnd { offset })
}

/// NUL-escaped payload terminated by a bare `0x00`
fn decode_escaped(source: &ByteSlice, offset: usize) -> Result<(ByteSlice, usize), TupleError> {
    let data = source.as_bytes();
    let start = offset + 1;
    let mut i = start;

    while i < data.len() {
        if data[i] != 0x00 {
            i += 1;
        } else if data.get(i + 1) == Some(&NUL_ESCAPE) {
            i += 2;
        } else {
            let raw = source.substring_len(start as isize, i - start);
            let unescaped = raw
                .unescaped()
                .map_err(|_| TupleError::MissingTerminator { offset })?;
            return Ok((unescaped, i + 1 - offset));
        }
    }

    Err(TupleError::MissingTerminator { offset })
}

fn decode_int(data: &[u8], offset: usize) -> Result<(i64, usize), TupleError> {
    let code = data[offset];
    if code == INT_ZERO_CODE {
        return Ok((0, 1));
    }

    if code > INT_ZERO_CODE {
        let size = (code - INT_ZERO_CODE) as usize;
        let raw = payload(data, offset, size)?;
        if raw[0] == 0x00 {
            return Err(TupleError::NonCanonicalInteger { offset });
        }
        let magnitude = BigEndian::read_uint(raw, size);
        if magnitude > i64::MAX as u64 {
            return Err(TupleError::IntegerOverflow { offset });
        }
        Ok((magnitude as i64, 1 + size))
    } else {
        let size = (INT_ZERO_CODE - code) as usize;
        let raw = payload(data, offset, size)?;
        if raw[0] == 0xFF {
            return Err(TupleError::NonCanonicalInteger { offset });
        }
        let mask = if size == 8 {
            u64::MAX
        } else {
            (1u64 << (size * 8)) - 1
        };
        let magnitude = !BigEndian::read_uint(raw, size) & mask;
        let min_magnitude = i64::MIN.unsigned_abs();
        if magnitude > min_magnitude {
            return Err(TupleError::IntegerOverflow { offset });
        }
        let n = if magnitude == min_magnitude {
            i64::MIN
        } else {
            -(magnitude as i64)
        };
        Ok((n, 1 + size))
    }
}

/// Nested elements up to the bare `0x00` terminator; `0x00 0xFF` is a nested null
fn decode_nested(source: &ByteSlice, offset: usize) -> Result<(Tuple, usize), TupleError> {
    let data = source.as_bytes();
    let mut elements = Vec::new();
    let mut i = offset + 1;

    while i < data.len() {
        if data[i] == TERMINATOR {
            if data.get(i + 1) == Some(&NUL_ESCAPE) {
                elements.push(Element::Null);
                i += 2;
            } else {
                return Ok((Tuple::from_elements(elements), i + 1 - offset));
            }
        } else {
            let (element, consumed) = decode_element(source, i)?;
            elements.push(element);
            i += consumed;
        }
    }

    Err(TupleError::UnterminatedNested { offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Result<Vec<Element>, TupleError> {
        decode_elements(&ByteSlice::copy_from(bytes), usize::MAX).map(|(elements, _)| elements)
    }

    #[test]
    fn test_unknown_type_code() {
        assert_eq!(
            decode_all(&[0x14, 0x99]),
            Err(TupleError::UnknownTypeCode {
                code: 0x99,
                offset: 1
            })
        );
    }

    #[test]
    fn test_truncated_payloads() {
        // Declared two-byte integer with one byte present
        assert_eq!(
            decode_all(&[0x16, 0x01]),
            Err(TupleError::UnexpectedEnd { offset: 0 })
        );
        assert_eq!(
            decode_all(&[DOUBLE_CODE, 0x80]),
            Err(TupleError::UnexpectedEnd { offset: 0 })
        );
        assert_eq!(
            decode_all(&[STRING_CODE, b'a', b'b']),
            Err(TupleError::MissingTerminator { offset: 0 })
        );
        assert_eq!(
            decode_all(&[NESTED_CODE, 0x14]),
            Err(TupleError::UnterminatedNested { offset: 0 })
        );
    }

    #[test]
    fn test_rejects_non_canonical_integers() {
        assert_eq!(
            decode_all(&[0x16, 0x00, 0x01]),
            Err(TupleError::NonCanonicalInteger { offset: 0 })
        );
        assert_eq!(
            decode_all(&[0x12, 0xFF, 0xFE]),
            Err(TupleError::NonCanonicalInteger { offset: 0 })
        );
    }

    #[test]
    fn test_rejects_overflowing_integers() {
        assert_eq!(
            decode_all(&[0x1C, 0x80, 0, 0, 0, 0, 0, 0, 0]),
            Err(TupleError::IntegerOverflow { offset: 0 })
        );
        // -(2^63 + 1)
        assert_eq!(
            decode_all(&[0x0C, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]),
            Err(TupleError::IntegerOverflow { offset: 0 })
        );
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(
            decode_all(&[STRING_CODE, 0xC3, 0x28, 0x00]),
            Err(TupleError::InvalidUtf8 { offset: 0 })
        );
    }

    #[test]
    fn test_bytes_decode_is_zero_copy_when_clean() {
        let packed = ByteSlice::copy_from(&[BYTES_CODE, b'a', b'b', 0x00]);
        let (elements, consumed) = decode_elements(&packed, usize::MAX).unwrap();
        assert_eq!(consumed, 4);
        let bytes = elements[0].as_bytes().unwrap();
        assert_eq!(bytes, &b"ab"[..]);
        // Same backing buffer: the view starts one byte into the packed key
        assert_eq!(bytes.as_bytes().as_ptr(), packed.as_bytes()[1..].as_ptr());
    }

    #[test]
    fn test_decode_stops_at_max_elements() {
        let packed = ByteSlice::copy_from(&[0x15, 0x01, 0x15, 0x02, 0x15, 0x03]);
        let (elements, consumed) = decode_elements(&packed, 2).unwrap();
        assert_eq!(elements, vec![Element::Int(1), Element::Int(2)]);
        assert_eq!(consumed, 4);
    }
}
