//! Property tests for the tuple encoding
//!
//! 1. Round trip: `unpack(pack(t)) == t` for arbitrary tuples, nesting included
//! 2. Order preservation: `t1.cmp(t2)` agrees with `pack(t1).cmp(pack(t2))`
//! 3. Prefix stability: `pack(t)` is a byte prefix of `pack(t.append(e))`
//! 4. Subspace composition: chained partitions equal one multi-element partition

use crate::{Element, Subspace, Tuple};
use proptest::prelude::*;
use strata_core::ByteSlice;
use uuid::Uuid;

fn arb_scalar() -> impl Strategy<Value = Element> {
    prop_oneof![
        Just(Element::Null),
        any::<String>().prop_map(Element::String),
        // NUL-heavy strings exercise the escape path
        prop::collection::vec(prop_oneof![Just('\0'), Just('a'), Just('b')], 0..6)
            .prop_map(|chars| Element::String(chars.into_iter().collect())),
        prop::collection::vec(any::<u8>(), 0..24)
            .prop_map(|bytes| Element::Bytes(ByteSlice::from_vec(bytes))),
        any::<i64>().prop_map(Element::Int),
        (-300i64..300).prop_map(Element::Int),
        any::<bool>().prop_map(Element::Bool),
        any::<f32>().prop_map(Element::Float),
        any::<f64>().prop_map(Element::Double),
        any::<u128>().prop_map(|n| Element::Uuid(Uuid::from_u128(n))),
    ]
}

fn arb_element() -> impl Strategy<Value = Element> {
    arb_scalar().prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(inner, 0..4)
            .prop_map(|elements| Element::Tuple(Tuple::from_elements(elements)))
    })
}

fn arb_tuple() -> impl Strategy<Value = Tuple> {
    prop::collection::vec(arb_element(), 0..5).prop_map(Tuple::from_elements)
}

/// Tuples drawn from a small alphabet so that shared prefixes are common
fn arb_close_tuple() -> impl Strategy<Value = Tuple> {
    let element = prop_oneof![
        Just(Element::Null),
        prop::collection::vec(prop_oneof![Just('\0'), Just('a')], 0..3)
            .prop_map(|chars| Element::String(chars.into_iter().collect())),
        (-2i64..3).prop_map(Element::Int),
        any::<bool>().prop_map(Element::Bool),
    ];
    let nested = element.prop_recursive(2, 8, 3, |inner| {
        prop::collection::vec(inner, 0..3)
            .prop_map(|elements| Element::Tuple(Tuple::from_elements(elements)))
    });
    prop::collection::vec(nested, 0..4).prop_map(Tuple::from_elements)
}

proptest! {
    #[test]
    fn prop_round_trip(tuple in arb_tuple()) {
        let packed = tuple.pack();
        prop_assert_eq!(packed.len(), tuple.packed_len());
        let decoded = Tuple::unpack(&packed).unwrap();
        prop_assert_eq!(&decoded, &tuple);
    }

    #[test]
    fn prop_round_trip_through_fresh_buffer(tuple in arb_tuple()) {
        let decoded = Tuple::unpack_bytes(tuple.pack().as_bytes()).unwrap();
        prop_assert_eq!(decoded.pack(), tuple.pack());
    }

    #[test]
    fn prop_order_preserved(a in arb_tuple(), b in arb_tuple()) {
        prop_assert_eq!(a.cmp(&b), a.pack().cmp(&b.pack()));
    }

    #[test]
    fn prop_order_preserved_near_prefixes(a in arb_close_tuple(), b in arb_close_tuple()) {
        prop_assert_eq!(a.cmp(&b), a.pack().cmp(&b.pack()));
    }

    #[test]
    fn prop_integer_order(x in any::<i64>(), y in any::<i64>()) {
        let a = Tuple::new().push(x);
        let b = Tuple::new().push(y);
        prop_assert_eq!(x.cmp(&y), a.pack().cmp(&b.pack()));
    }

    #[test]
    fn prop_prefix_stable(tuple in arb_tuple(), extra in arb_element()) {
        let extended = tuple.append(extra);
        prop_assert!(extended.pack().starts_with(tuple.pack().as_bytes()));
        prop_assert!(tuple < extended);
    }

    #[test]
    fn prop_partition_composes(
        root in arb_tuple(),
        a in arb_element(),
        b in arb_element(),
        suffix in arb_tuple(),
    ) {
        let space = Subspace::new(root);
        let chained = space.partition(a.clone()).partition(b.clone());
        let direct = space.partition2(a, b);
        prop_assert_eq!(chained.prefix(), direct.prefix());

        let key = chained.key(&suffix);
        prop_assert!(key.starts_with(space.prefix().as_bytes()));
        prop_assert_eq!(chained.unpack(&key).unwrap(), suffix);
    }
}
