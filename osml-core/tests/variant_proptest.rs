//! Property-based tests for variant ordering and coercion

use osml_core::variant::{parse_double, parse_int, Variant};
use proptest::prelude::*;
use std::cmp::Ordering;

fn scalar_strategy() -> impl Strategy<Value = Variant> {
    prop_oneof![
        Just(Variant::Null),
        any::<bool>().prop_map(Variant::Bool),
        any::<i64>().prop_map(Variant::Int),
        any::<f64>().prop_map(Variant::Double),
        "[ -~]{0,16}".prop_map(Variant::from),
    ]
}

proptest! {
    /// For any two variants exactly one of `<`, `==`, `>` holds.
    #[test]
    fn ordering_is_total(a in scalar_strategy(), b in scalar_strategy()) {
        let ab = a.partial_cmp(&b);
        prop_assert!(ab.is_some());
        let ba = b.partial_cmp(&a);
        match ab {
            Some(Ordering::Less) => prop_assert_eq!(ba, Some(Ordering::Greater)),
            Some(Ordering::Greater) => prop_assert_eq!(ba, Some(Ordering::Less)),
            Some(Ordering::Equal) => prop_assert_eq!(ba, Some(Ordering::Equal)),
            None => unreachable!(),
        }
    }

    /// Ordering agrees with equality.
    #[test]
    fn equal_iff_ordering_equal(a in scalar_strategy(), b in scalar_strategy()) {
        let equal = a == b;
        prop_assert_eq!(equal, a.partial_cmp(&b) == Some(Ordering::Equal));
    }

    /// Integer round-trip through the string parser.
    #[test]
    fn int_roundtrip(i in any::<i64>()) {
        prop_assert_eq!(parse_int(&i.to_string()), Some(i));
    }

    /// Finite doubles round-trip through the string parser.
    #[test]
    fn double_roundtrip(d in any::<f64>().prop_filter("finite", |d| d.is_finite())) {
        let parsed = parse_double(&format!("{:?}", d));
        prop_assert_eq!(parsed, Some(d));
    }
}
