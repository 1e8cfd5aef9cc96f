//! The `Tuple` type

use crate::decoding::decode_elements;
use crate::element::Element;
use crate::encoding::{encode_element, encoded_len};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use strata_core::{ByteSlice, StrataError, StrataResult};

/// An ordered sequence of typed elements with an order-preserving packed form
///
/// Tuples compare element-wise, shorter first on a common prefix. For any
/// two tuples that order agrees with unsigned byte comparison of their
/// packed forms.
///
/// The packed form is computed on the first call to [`Tuple::pack`] and
/// cached; later calls are a reference-count bump. Builder methods that
/// consume or copy the tuple never carry a stale cache.
///
/// # Example
///
/// ```
/// use strata_tuple::Tuple;
///
/// let short = Tuple::new().push("A");
/// let long = Tuple::new().push("AA");
/// assert!(short < long);
/// assert!(short.pack() < long.pack());
/// ```
#[derive(Clone, Default)]
pub struct Tuple {
    elements: Vec<Element>,
    packed: OnceLock<ByteSlice>,
}

impl Tuple {
    /// Create an empty tuple
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tuple with room for `capacity` elements
    pub fn with_capacity(capacity: usize) -> Self {
        Tuple {
            elements: Vec::with_capacity(capacity),
            packed: OnceLock::new(),
        }
    }

    /// Wrap an element vector
    pub fn from_elements(elements: Vec<Element>) -> Self {
        Tuple {
            elements,
            packed: OnceLock::new(),
        }
    }

    /// Append an element (builder style)
    pub fn push<E: Into<Element>>(mut self, element: E) -> Self {
        self.push_mut(element);
        self
    }

    /// Append an element in place
    pub fn push_mut<E: Into<Element>>(&mut self, element: E) {
        self.elements.push(element.into());
        self.packed.take();
    }

    /// New tuple with `element` appended; `self` is unchanged
    pub fn append<E: Into<Element>>(&self, element: E) -> Tuple {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.extend(self.elements.iter().cloned());
        elements.push(element.into());
        Tuple::from_elements(elements)
    }

    /// New tuple holding the elements of `self` followed by those of `other`
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut elements = Vec::with_capacity(self.elements.len() + other.elements.len());
        elements.extend(self.elements.iter().cloned());
        elements.extend(other.elements.iter().cloned());
        Tuple::from_elements(elements)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the tuple has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Iterate over the elements
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    /// The elements as a slice
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Consume the tuple, returning its elements
    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    // ========== Typed accessors ==========

    /// Integer at `index`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the index is out of range or
    /// the element is not an `Int`.
    pub fn get_i64(&self, index: usize) -> StrataResult<i64> {
        let element = self.required(index)?;
        element
            .as_i64()
            .ok_or_else(|| type_mismatch(index, "int", element))
    }

    /// String at `index`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the index is out of range or
    /// the element is not a `String`.
    pub fn get_str(&self, index: usize) -> StrataResult<&str> {
        let element = self.required(index)?;
        element
            .as_str()
            .ok_or_else(|| type_mismatch(index, "string", element))
    }

    /// Byte string at `index`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the index is out of range or
    /// the element is not `Bytes`.
    pub fn get_bytes(&self, index: usize) -> StrataResult<&ByteSlice> {
        let element = self.required(index)?;
        element
            .as_bytes()
            .ok_or_else(|| type_mismatch(index, "bytes", element))
    }

    /// Boolean at `index`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the index is out of range or
    /// the element is not a `Bool`.
    pub fn get_bool(&self, index: usize) -> StrataResult<bool> {
        let element = self.required(index)?;
        element
            .as_bool()
            .ok_or_else(|| type_mismatch(index, "bool", element))
    }

    /// Nested tuple at `index`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the index is out of range or
    /// the element is not a `Tuple`.
    pub fn get_tuple(&self, index: usize) -> StrataResult<&Tuple> {
        let element = self.required(index)?;
        element
            .as_tuple()
            .ok_or_else(|| type_mismatch(index, "tuple", element))
    }

    fn required(&self, index: usize) -> StrataResult<&Element> {
        self.elements.get(index).ok_or_else(|| {
            StrataError::invalid_input(format!(
                "tuple index {} out of range for length {}",
                index,
                self.elements.len()
            ))
        })
    }

    // ========== Packing ==========

    /// Packed form, computed once and cached
    pub fn pack(&self) -> ByteSlice {
        self.packed
            .get_or_init(|| {
                let mut buf = Vec::with_capacity(self.packed_len());
                self.encode_into(&mut buf);
                ByteSlice::from_vec(buf)
            })
            .clone()
    }

    /// Length of the packed form in bytes
    pub fn packed_len(&self) -> usize {
        match self.packed.get() {
            Some(packed) => packed.len(),
            None => self.elements.iter().map(|e| encoded_len(e, false)).sum(),
        }
    }

    /// Append the packed form to `buf`
    ///
    /// Lets a caller build `prefix ++ packed` in one allocation.
    pub fn pack_into(&self, buf: &mut Vec<u8>) {
        match self.packed.get() {
            Some(packed) => buf.extend_from_slice(packed.as_bytes()),
            None => self.encode_into(buf),
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        for element in &self.elements {
            encode_element(element, buf, false);
        }
    }

    /// Decode a packed tuple
    ///
    /// Every byte must belong to a well-formed element. The input is kept as
    /// the cached packed form; the encoding is canonical, so re-packing would
    /// produce the same bytes.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Codec` on an unknown type code, a truncated
    /// payload, invalid UTF-8 or an out-of-range integer.
    pub fn unpack(packed: &ByteSlice) -> StrataResult<Tuple> {
        let (elements, _) = decode_elements(packed, usize::MAX)?;
        let tuple = Tuple::from_elements(elements);
        // A nil input decodes to the empty tuple, which packs to empty
        if !packed.is_nil() {
            let _ = tuple.packed.set(packed.clone());
        }
        Ok(tuple)
    }

    /// Decode a packed tuple from raw bytes (copied once)
    ///
    /// # Errors
    ///
    /// See [`Tuple::unpack`].
    pub fn unpack_bytes(packed: &[u8]) -> StrataResult<Tuple> {
        Self::unpack(&ByteSlice::copy_from(packed))
    }

    /// Decode at most `max_elements` leading elements
    ///
    /// Returns the tuple and the number of bytes it occupied, so the caller
    /// can continue with the remainder.
    ///
    /// # Errors
    ///
    /// See [`Tuple::unpack`].
    pub fn unpack_partial(packed: &ByteSlice, max_elements: usize) -> StrataResult<(Tuple, usize)> {
        let (elements, consumed) = decode_elements(packed, max_elements)?;
        Ok((Tuple::from_elements(elements), consumed))
    }

    // ========== Ranges ==========

    /// Key range covering every tuple that strictly extends this one
    ///
    /// Returns `(packed ++ 0x00, packed ++ 0xFF)`; the tuple's own key is
    /// not included.
    pub fn range(&self) -> (ByteSlice, ByteSlice) {
        let packed = self.pack();
        (packed.concat(&[0x00]), packed.concat(&[0xFF]))
    }

    /// First key that sorts after every key prefixed by this tuple
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the packed form is empty or
    /// consists only of `0xFF` bytes.
    pub fn strinc(&self) -> StrataResult<ByteSlice> {
        strinc(self.pack().as_bytes())
    }
}

/// Smallest key greater than every key starting with `key`
///
/// Strips trailing `0xFF` bytes and increments the last remaining byte.
///
/// # Errors
///
/// Returns `StrataError::InvalidInput` if `key` is empty or all `0xFF`.
pub fn strinc(key: &[u8]) -> StrataResult<ByteSlice> {
    let end = key
        .iter()
        .rposition(|&b| b != 0xFF)
        .ok_or_else(|| StrataError::invalid_input("key must contain a byte other than 0xFF"))?;
    let mut out = key[..=end].to_vec();
    out[end] += 1;
    Ok(ByteSlice::from_vec(out))
}

fn type_mismatch(index: usize, expected: &str, found: &Element) -> StrataError {
    StrataError::invalid_input(format!(
        "tuple element {} is {}, expected {}",
        index,
        found.type_name(),
        expected
    ))
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Eq for Tuple {}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.elements.cmp(&other.elements)
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", element)?;
        }
        if self.elements.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuple{}", self)
    }
}

impl FromIterator<Element> for Tuple {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Tuple::from_elements(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn t<E: Into<Element>>(e: E) -> Tuple {
        Tuple::new().push(e)
    }

    fn assert_ordered(a: &Tuple, b: &Tuple) {
        assert!(a < b, "{} should sort before {}", a, b);
        assert!(
            a.pack() < b.pack(),
            "packed {} should sort before packed {}",
            a.pack().to_hex(),
            b.pack().to_hex()
        );
    }

    #[test]
    fn test_string_ordering() {
        assert_ordered(&t("A"), &t("AA"));
        assert_ordered(&t("AA"), &t("B"));
        assert_ordered(&t("a"), &t("a\0"));
    }

    #[test]
    fn test_integer_ordering() {
        assert_ordered(&t(-5i64), &t(0i64));
        assert_ordered(&t(0i64), &t(5i64));
        assert_ordered(&t(i64::MIN), &t(-256i64));
        assert_ordered(&t(-256i64), &t(-255i64));
        assert_ordered(&t(255i64), &t(256i64));
        assert_ordered(&t(256i64), &t(i64::MAX));
    }

    #[test]
    fn test_nested_ordering() {
        let x = Tuple::new().push("x");
        let xy = Tuple::new().push("x").push("y");
        assert_ordered(&t(x), &t(xy));

        let a = Tuple::new().push("A");
        let ab = Tuple::new().push("A").push("B");
        let ac = Tuple::new().push("A").push("C");
        assert_ordered(&a, &ab);
        assert_ordered(&ab, &ac);

        // Empty nested tuple before one holding a null
        assert_ordered(&t(Tuple::new()), &t(Tuple::new().push(Element::Null)));
    }

    #[test]
    fn test_round_trip_mixed_tuple() {
        let deep = Tuple::new()
            .push(Tuple::new().push("inner").push(Element::Null))
            .push(-70000i64);
        let tuple = Tuple::new()
            .push(Element::Null)
            .push("")
            .push("with\0nul")
            .push(vec![0x00, 0xFF, 0x00])
            .push(-1i64)
            .push(i64::MIN)
            .push(0x1_0000_0000i64)
            .push(i64::MAX)
            .push(1.5f32)
            .push(-2.25f64)
            .push(true)
            .push(false)
            .push(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef))
            .push(deep);

        let packed = tuple.pack();
        assert_eq!(packed.len(), tuple.packed_len());
        let decoded = Tuple::unpack(&packed).unwrap();
        assert_eq!(decoded, tuple);
        assert_eq!(decoded.pack(), packed);
    }

    #[test]
    fn test_pack_is_memoized_and_invalidated() {
        let mut tuple = Tuple::new().push("a");
        let first = tuple.pack();
        let second = tuple.pack();
        assert_eq!(first.as_bytes().as_ptr(), second.as_bytes().as_ptr());

        tuple.push_mut(1i64);
        let third = tuple.pack();
        assert_ne!(third, first);
        assert_eq!(Tuple::unpack(&third).unwrap(), tuple);
    }

    #[test]
    fn test_unpack_nil_packs_as_empty() {
        let tuple = Tuple::unpack(&ByteSlice::nil()).unwrap();
        assert_eq!(tuple, Tuple::new());
        assert_eq!(tuple.pack(), Tuple::new().pack());
        assert!(!tuple.pack().is_nil());

        let subspace = crate::Subspace::new(tuple);
        assert!(!subspace.prefix().is_nil());
    }

    #[test]
    fn test_pack_into_appends() {
        let tuple = Tuple::new().push(7i64);
        let mut buf = vec![0xAA];
        tuple.pack_into(&mut buf);
        assert_eq!(buf, vec![0xAA, 0x15, 0x07]);
    }

    #[test]
    fn test_append_does_not_mutate() {
        let base = Tuple::new().push("a");
        let child = base.append(1i64);
        assert_eq!(base.len(), 1);
        assert_eq!(child.len(), 2);
        assert!(child.pack().starts_with(base.pack().as_bytes()));

        let joined = base.concat(&Tuple::new().push(2i64).push(3i64));
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.get_i64(2).unwrap(), 3);
    }

    #[test]
    fn test_typed_accessors() {
        let tuple = Tuple::new()
            .push("name")
            .push(42i64)
            .push(vec![1u8, 2])
            .push(true)
            .push(Tuple::new());
        assert_eq!(tuple.get_str(0).unwrap(), "name");
        assert_eq!(tuple.get_i64(1).unwrap(), 42);
        assert_eq!(tuple.get_bytes(2).unwrap(), &[1u8, 2][..]);
        assert!(tuple.get_bool(3).unwrap());
        assert!(tuple.get_tuple(4).unwrap().is_empty());

        assert!(matches!(
            tuple.get_i64(0),
            Err(StrataError::InvalidInput { .. })
        ));
        assert!(matches!(
            tuple.get_str(9),
            Err(StrataError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_unpack_reports_codec_errors() {
        let err = Tuple::unpack_bytes(&[0x02, b'a']).unwrap_err();
        assert!(matches!(err, StrataError::Codec { offset: 0, .. }));

        let err = Tuple::unpack_bytes(&[0x14, 0xEE]).unwrap_err();
        assert!(matches!(err, StrataError::Codec { offset: 1, .. }));
    }

    #[test]
    fn test_unpack_partial() {
        let packed = Tuple::new().push(1i64).push("rest").push(3i64).pack();
        let (head, consumed) = Tuple::unpack_partial(&packed, 1).unwrap();
        assert_eq!(head, Tuple::new().push(1i64));
        assert_eq!(consumed, 2);

        let tail = Tuple::unpack(&packed.substring(consumed as isize)).unwrap();
        assert_eq!(tail, Tuple::new().push("rest").push(3i64));
    }

    #[test]
    fn test_range_excludes_own_key() {
        let prefix = Tuple::new().push("users");
        let (begin, end) = prefix.range();
        let own = prefix.pack();
        let child = prefix.append(1i64).pack();

        assert!(own < begin);
        assert!(begin <= child && child < end);
    }

    #[test]
    fn test_strinc() {
        assert_eq!(strinc(&[0x01, 0x02]).unwrap(), vec![0x01, 0x03]);
        assert_eq!(strinc(&[0x01, 0xFF, 0xFF]).unwrap(), vec![0x02]);
        assert!(strinc(&[0xFF, 0xFF]).is_err());
        assert!(strinc(&[]).is_err());

        let prefix = Tuple::new().push("a");
        let end = prefix.strinc().unwrap();
        assert!(prefix.append(i64::MAX).pack() < end);
    }

    #[test]
    fn test_display() {
        assert_eq!(Tuple::new().to_string(), "()");
        assert_eq!(t("a").to_string(), "(\"a\",)");
        assert_eq!(
            Tuple::new().push(1i64).push(Element::Null).to_string(),
            "(1, null)"
        );
    }
}
