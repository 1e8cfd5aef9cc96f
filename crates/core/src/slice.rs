//! Immutable byte slices
//!
//! `ByteSlice` is the value type every key and value in the layer stack is
//! expressed in. It is a `(buffer, offset, count)` view over a shared,
//! immutable backing buffer:
//!
//! - Views created by `substring` share the backing buffer (zero-copy).
//! - A slice is never mutated after construction; `memoize` produces a
//!   private copy when a caller needs to drop a large backing buffer.
//! - The absent slice (`nil`) and the present-but-empty slice (`empty`) are
//!   distinct values and never compare equal.
//!
//! # Ordering
//!
//! Slices order lexicographically by unsigned byte value, shorter first on a
//! common prefix. `nil` sorts before every present slice, including `empty`.
//!
//! # NUL escaping
//!
//! Byte strings embedded in tuple keys escape `0x00` as the pair `0x00 0xFF`
//! so that a bare `0x00` can act as a terminator. [`ByteSlice::unescaped`]
//! reverses that scheme and is what the text decoders use.

use crate::error::{StrataError, StrataResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use byteorder::{ByteOrder, NativeEndian};
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Escaped rendering of the absent slice
pub const NIL_MARKER: &str = "<null>";

/// Escaped rendering of the present empty slice
pub const EMPTY_MARKER: &str = "<empty>";

/// Companion byte written after an escaped `0x00`
pub const NUL_ESCAPE: u8 = 0xFF;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Immutable view over a contiguous byte range
///
/// Cloning is O(1): the backing buffer is reference counted.
///
/// # Example
///
/// ```
/// use strata_core::ByteSlice;
///
/// let key = ByteSlice::from("hello world");
/// let word = key.substring_len(6, 5);
/// assert_eq!(word, &b"world"[..]);
/// assert!(ByteSlice::nil() < ByteSlice::empty());
/// ```
#[derive(Clone)]
pub struct ByteSlice {
    buffer: Option<Arc<[u8]>>,
    offset: usize,
    count: usize,
}

impl ByteSlice {
    // ========== Factories ==========

    /// The absent slice (semantically null)
    pub fn nil() -> Self {
        ByteSlice {
            buffer: None,
            offset: 0,
            count: 0,
        }
    }

    /// A present slice with no bytes
    pub fn empty() -> Self {
        ByteSlice {
            buffer: Some(Arc::from(&[][..])),
            offset: 0,
            count: 0,
        }
    }

    /// Take ownership of a freshly allocated buffer
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let count = bytes.len();
        ByteSlice {
            buffer: Some(Arc::from(bytes)),
            offset: 0,
            count,
        }
    }

    /// Copy `bytes` into a new private buffer
    pub fn copy_from(bytes: &[u8]) -> Self {
        ByteSlice {
            buffer: Some(Arc::from(bytes)),
            offset: 0,
            count: bytes.len(),
        }
    }

    /// Create a view over a shared buffer
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Range` if `offset` is not inside the buffer
    /// (unless `count` is 0) or `offset + count` runs past its end.
    pub fn create(buffer: Arc<[u8]>, offset: usize, count: usize) -> StrataResult<Self> {
        let len = buffer.len();
        if count > 0 && offset >= len {
            return Err(StrataError::range(format!(
                "offset {} is outside a buffer of length {}",
                offset, len
            )));
        }
        match offset.checked_add(count) {
            Some(end) if end <= len => Ok(ByteSlice {
                buffer: Some(buffer),
                offset,
                count,
            }),
            _ => Err(StrataError::range(format!(
                "view [{}..{}+{}) exceeds buffer of length {}",
                offset, offset, count, len
            ))),
        }
    }

    /// Encode an `i32` in host byte order
    ///
    /// The result depends on the platform's endianness and must not be used
    /// for data shared across processes or hosts. Use the tuple encoding for
    /// portable, order-preserving integers.
    pub fn from_i32_ne(value: i32) -> Self {
        let mut buf = [0u8; 4];
        NativeEndian::write_i32(&mut buf, value);
        Self::copy_from(&buf)
    }

    /// Encode an `i64` in host byte order (host-local, see [`ByteSlice::from_i32_ne`])
    pub fn from_i64_ne(value: i64) -> Self {
        let mut buf = [0u8; 8];
        NativeEndian::write_i64(&mut buf, value);
        Self::copy_from(&buf)
    }

    /// Encode text as UTF-8
    ///
    /// `None` maps to the absent slice and `Some("")` to the empty slice.
    pub fn from_utf8_text(text: Option<&str>) -> Self {
        match text {
            None => Self::nil(),
            Some("") => Self::empty(),
            Some(s) => Self::copy_from(s.as_bytes()),
        }
    }

    /// Encode ASCII text one byte per character
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` if the text contains non-ASCII characters.
    pub fn from_ascii_text(text: Option<&str>) -> StrataResult<Self> {
        match text {
            Some(s) if !s.is_ascii() => Err(StrataError::format(format!(
                "text contains non-ASCII characters: {:?}",
                s
            ))),
            other => Ok(Self::from_utf8_text(other)),
        }
    }

    /// Parse an even-length string of hex digits
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` on odd length or a non-hex digit.
    pub fn from_hex(hex: &str) -> StrataResult<Self> {
        let digits = hex.as_bytes();
        if digits.len() % 2 != 0 {
            return Err(StrataError::format(format!(
                "hex string has odd length {}",
                digits.len()
            )));
        }
        if digits.is_empty() {
            return Ok(Self::empty());
        }

        let mut out = Vec::with_capacity(digits.len() / 2);
        for (i, pair) in digits.chunks_exact(2).enumerate() {
            let hi = hex_value(pair[0]).ok_or_else(|| invalid_hex_digit(hex, i * 2))?;
            let lo = hex_value(pair[1]).ok_or_else(|| invalid_hex_digit(hex, i * 2 + 1))?;
            out.push((hi << 4) | lo);
        }
        Ok(Self::from_vec(out))
    }

    /// Decode standard base64
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` if the input is not valid base64.
    pub fn from_base64(encoded: &str) -> StrataResult<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| StrataError::format(format!("invalid base64: {}", e)))?;
        Ok(Self::from_vec(bytes))
    }

    /// Parse the output of [`ByteSlice::to_escaped_string`]
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` if an escape sequence is not closed by
    /// `>` three characters after the `<`, holds non-hex digits, or if the
    /// input contains characters that would have been escaped.
    pub fn from_escaped_string(text: &str) -> StrataResult<Self> {
        if text == NIL_MARKER {
            return Ok(Self::nil());
        }
        if text == EMPTY_MARKER || text.is_empty() {
            return Ok(Self::empty());
        }

        let input = text.as_bytes();
        let mut out = Vec::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            let c = input[i];
            if c == b'<' {
                if i + 3 >= input.len() || input[i + 3] != b'>' {
                    return Err(StrataError::format(format!(
                        "unterminated escape sequence at position {}",
                        i
                    )));
                }
                let hi = hex_value(input[i + 1]).ok_or_else(|| invalid_hex_digit(text, i + 1))?;
                let lo = hex_value(input[i + 2]).ok_or_else(|| invalid_hex_digit(text, i + 2))?;
                out.push((hi << 4) | lo);
                i += 4;
            } else if is_printable(c) {
                out.push(c);
                i += 1;
            } else {
                return Err(StrataError::format(format!(
                    "unescaped byte 0x{:02X} at position {}",
                    c, i
                )));
            }
        }
        Ok(Self::from_vec(out))
    }

    // ========== Accessors ==========

    /// Whether this is the absent slice
    pub fn is_nil(&self) -> bool {
        self.buffer.is_none()
    }

    /// Number of bytes in the view
    pub fn len(&self) -> usize {
        self.count
    }

    /// True for zero-length slices, including `nil`
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The viewed bytes (`&[]` for `nil`)
    pub fn as_bytes(&self) -> &[u8] {
        match &self.buffer {
            Some(buffer) => &buffer[self.offset..self.offset + self.count],
            None => &[],
        }
    }

    /// Copy the viewed bytes into a new `Vec`
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Byte at `index`; negative indices count from the end
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Range` if the resolved index is out of bounds.
    pub fn at(&self, index: isize) -> StrataResult<u8> {
        let resolved = self.resolve(index);
        if resolved < 0 || resolved as usize >= self.count {
            return Err(StrataError::range(format!(
                "index {} out of bounds for slice of length {}",
                index, self.count
            )));
        }
        Ok(self.as_bytes()[resolved as usize])
    }

    /// Zero-copy view from `offset` to the end; negative offsets count from the end
    ///
    /// # Panics
    ///
    /// Panics if the resolved offset lies outside the slice. Use
    /// [`ByteSlice::try_substring`] when the bounds are not known to be valid.
    pub fn substring(&self, offset: isize) -> ByteSlice {
        let start = self.resolve(offset);
        assert!(
            start >= 0 && start as usize <= self.count,
            "substring offset {} out of range for slice of length {}",
            offset,
            self.count
        );
        self.view(start as usize, self.count - start as usize)
    }

    /// Zero-copy view of `count` bytes at `offset`; negative offsets count from the end
    ///
    /// # Panics
    ///
    /// Panics if the resolved range lies outside the slice.
    pub fn substring_len(&self, offset: isize, count: usize) -> ByteSlice {
        let start = self.resolve(offset);
        assert!(
            start >= 0 && (start as usize).saturating_add(count) <= self.count,
            "substring [{}, +{}) out of range for slice of length {}",
            offset,
            count,
            self.count
        );
        self.view(start as usize, count)
    }

    /// Checked variant of [`ByteSlice::substring_len`]
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Range` if the resolved range lies outside the slice.
    pub fn try_substring(&self, offset: isize, count: usize) -> StrataResult<ByteSlice> {
        let start = self.resolve(offset);
        if start < 0 || (start as usize).saturating_add(count) > self.count {
            return Err(StrataError::range(format!(
                "substring [{}, +{}) out of range for slice of length {}",
                offset, count, self.count
            )));
        }
        Ok(self.view(start as usize, count))
    }

    /// Private copy that no longer aliases the backing buffer
    pub fn memoize(&self) -> ByteSlice {
        if self.is_nil() {
            return Self::nil();
        }
        Self::copy_from(self.as_bytes())
    }

    /// Concatenate in a single allocation (`nil` contributes no bytes)
    pub fn concat(&self, suffix: &[u8]) -> ByteSlice {
        let mut buf = Vec::with_capacity(self.count + suffix.len());
        buf.extend_from_slice(self.as_bytes());
        buf.extend_from_slice(suffix);
        Self::from_vec(buf)
    }

    /// Whether the slice begins with `prefix`
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        !self.is_nil() && self.as_bytes().starts_with(prefix)
    }

    /// Whether the slice ends with `suffix`
    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        !self.is_nil() && self.as_bytes().ends_with(suffix)
    }

    /// Decode an `i32` written by [`ByteSlice::from_i32_ne`]
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` unless the slice is exactly 4 bytes.
    pub fn to_i32_ne(&self) -> StrataResult<i32> {
        if self.count != 4 {
            return Err(StrataError::format(format!(
                "expected 4 bytes for i32, got {}",
                self.count
            )));
        }
        Ok(NativeEndian::read_i32(self.as_bytes()))
    }

    /// Decode an `i64` written by [`ByteSlice::from_i64_ne`]
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` unless the slice is exactly 8 bytes.
    pub fn to_i64_ne(&self) -> StrataResult<i64> {
        if self.count != 8 {
            return Err(StrataError::format(format!(
                "expected 8 bytes for i64, got {}",
                self.count
            )));
        }
        Ok(NativeEndian::read_i64(self.as_bytes()))
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.count * 2);
        for b in self.as_bytes() {
            // Writing to a String cannot fail
            let _ = write!(out, "{:02x}", b);
        }
        out
    }

    /// Standard base64 rendering
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.as_bytes())
    }

    /// Printable rendering that round-trips through [`ByteSlice::from_escaped_string`]
    ///
    /// Printable ASCII is kept verbatim; every other byte, and `<` itself,
    /// is rendered as `<XX>`. `nil` renders as `<null>`, empty as `<empty>`.
    pub fn to_escaped_string(&self) -> String {
        if self.is_nil() {
            return NIL_MARKER.to_string();
        }
        if self.count == 0 {
            return EMPTY_MARKER.to_string();
        }
        let mut out = String::with_capacity(self.count);
        for &b in self.as_bytes() {
            if is_printable(b) {
                out.push(b as char);
            } else {
                let _ = write!(out, "<{:02X}>", b);
            }
        }
        out
    }

    // ========== NUL escaping ==========

    /// Undo `0x00 0xFF` escaping
    ///
    /// Scans forward once. When no `0x00` is present the slice itself is
    /// returned (zero-copy); otherwise a new buffer is allocated at the first
    /// `0x00` and the copy continues from that position.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` if a `0x00` is not followed by `0xFF`.
    pub fn unescaped(&self) -> StrataResult<ByteSlice> {
        let bytes = self.as_bytes();
        let first = match bytes.iter().position(|&b| b == 0x00) {
            Some(pos) => pos,
            None => return Ok(self.clone()),
        };

        let mut out = Vec::with_capacity(bytes.len() - 1);
        out.extend_from_slice(&bytes[..first]);
        let mut i = first;
        while i < bytes.len() {
            let b = bytes[i];
            if b == 0x00 {
                if bytes.get(i + 1) != Some(&NUL_ESCAPE) {
                    return Err(StrataError::format(format!(
                        "NUL at position {} is not followed by 0xFF",
                        i
                    )));
                }
                out.push(0x00);
                i += 2;
            } else {
                out.push(b);
                i += 1;
            }
        }
        Ok(Self::from_vec(out))
    }

    /// Apply `0x00 0xFF` escaping (zero-copy when no `0x00` is present)
    pub fn escaped(&self) -> ByteSlice {
        if !self.as_bytes().contains(&0x00) {
            return self.clone();
        }
        let mut out = Vec::with_capacity(self.count + 4);
        escape_nul_into(self.as_bytes(), &mut out);
        Self::from_vec(out)
    }

    /// Decode as UTF-8 text, undoing NUL escaping first
    ///
    /// Returns `None` for the absent slice and `Some("")` for the empty one.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` on a broken escape or invalid UTF-8.
    pub fn decode_utf8(&self) -> StrataResult<Option<String>> {
        if self.is_nil() {
            return Ok(None);
        }
        let clean = self.unescaped()?;
        std::str::from_utf8(clean.as_bytes())
            .map(|s| Some(s.to_owned()))
            .map_err(|e| StrataError::format(format!("invalid UTF-8: {}", e)))
    }

    /// Decode as ASCII text, undoing NUL escaping first
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Format` on a broken escape or a byte above 0x7F.
    pub fn decode_ascii(&self) -> StrataResult<Option<String>> {
        if self.is_nil() {
            return Ok(None);
        }
        let clean = self.unescaped()?;
        if let Some(pos) = clean.as_bytes().iter().position(|b| !b.is_ascii()) {
            return Err(StrataError::format(format!(
                "non-ASCII byte 0x{:02X} at position {}",
                clean.as_bytes()[pos],
                pos
            )));
        }
        Ok(Some(clean.as_bytes().iter().map(|&b| b as char).collect()))
    }

    // ========== Comparison ==========

    /// Compare against an `(offset, count)` view of a raw buffer
    ///
    /// Same semantics as `==` against the viewed bytes.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Range` if the view lies outside `buffer`.
    pub fn equals_view(&self, buffer: &[u8], offset: usize, count: usize) -> StrataResult<bool> {
        let end = offset.checked_add(count).filter(|&end| end <= buffer.len());
        match end {
            Some(end) => Ok(*self == buffer[offset..end]),
            None => Err(StrataError::range(format!(
                "view [{}, +{}) exceeds buffer of length {}",
                offset,
                count,
                buffer.len()
            ))),
        }
    }

    /// Order against raw bytes; `nil` sorts first
    pub fn compare_bytes(&self, other: &[u8]) -> Ordering {
        if self.is_nil() {
            return Ordering::Less;
        }
        self.as_bytes().cmp(other)
    }

    /// 32-bit FNV-1a over the content; `nil` hashes to 0
    pub fn fnv_hash(&self) -> u32 {
        if self.is_nil() {
            return 0;
        }
        self.as_bytes().iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
            (hash ^ b as u32).wrapping_mul(FNV_PRIME)
        })
    }

    // ========== Internal ==========

    fn resolve(&self, index: isize) -> isize {
        if index < 0 {
            index + self.count as isize
        } else {
            index
        }
    }

    fn view(&self, start: usize, count: usize) -> ByteSlice {
        ByteSlice {
            buffer: self.buffer.clone(),
            offset: self.offset + start,
            count,
        }
    }
}

/// Append `bytes` to `buf`, writing every `0x00` as `0x00 0xFF`
pub fn escape_nul_into(bytes: &[u8], buf: &mut Vec<u8>) {
    for &b in bytes {
        buf.push(b);
        if b == 0x00 {
            buf.push(NUL_ESCAPE);
        }
    }
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) && b != b'<'
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

fn invalid_hex_digit(input: &str, position: usize) -> StrataError {
    let digit = input.as_bytes()[position];
    StrataError::format(format!(
        "invalid hex digit 0x{:02X} at position {}",
        digit, position
    ))
}

// ========== Trait impls ==========

impl Default for ByteSlice {
    fn default() -> Self {
        Self::nil()
    }
}

impl PartialEq for ByteSlice {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_nil(), other.is_nil()) {
            (true, true) => true,
            (false, false) => self.as_bytes() == other.as_bytes(),
            _ => false,
        }
    }
}

impl Eq for ByteSlice {}

impl PartialEq<[u8]> for ByteSlice {
    fn eq(&self, other: &[u8]) -> bool {
        !self.is_nil() && self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for ByteSlice {
    fn eq(&self, other: &&[u8]) -> bool {
        *self == **other
    }
}

impl PartialEq<Vec<u8>> for ByteSlice {
    fn eq(&self, other: &Vec<u8>) -> bool {
        *self == other[..]
    }
}

impl Ord for ByteSlice {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_nil(), other.is_nil()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.as_bytes().cmp(other.as_bytes()),
        }
    }
}

impl PartialOrd for ByteSlice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ByteSlice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.fnv_hash());
    }
}

impl AsRef<[u8]> for ByteSlice {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Vec<u8>> for ByteSlice {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl From<&[u8]> for ByteSlice {
    fn from(bytes: &[u8]) -> Self {
        Self::copy_from(bytes)
    }
}

impl From<&str> for ByteSlice {
    fn from(text: &str) -> Self {
        Self::copy_from(text.as_bytes())
    }
}

impl From<String> for ByteSlice {
    fn from(text: String) -> Self {
        Self::from_vec(text.into_bytes())
    }
}

impl fmt::Display for ByteSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_escaped_string())
    }
}

impl fmt::Debug for ByteSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.to_escaped_string())
    }
}
