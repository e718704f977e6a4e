//! Table-driven coercion cases for the variant type

use osml_core::variant::{parse_double, parse_int, Variant};
use rstest::rstest;

#[rstest]
#[case::decimal("42", Some(42))]
#[case::signed_plus("+7", Some(7))]
#[case::signed_minus("-7", Some(-7))]
#[case::padded(" 42 ", Some(42))]
#[case::hex("0x1f", Some(31))]
#[case::hex_upper("0X1F", Some(31))]
#[case::negative_hex("-0x10", Some(-16))]
#[case::scientific("1e3", Some(1000))]
#[case::fraction_truncates("2.9", Some(2))]
#[case::not_a_number("abc", None)]
#[case::empty("", None)]
fn parse_int_cases(#[case] input: &str, #[case] expected: Option<i64>) {
    assert_eq!(parse_int(input), expected);
}

#[rstest]
#[case::fraction("1.5", Some(1.5))]
#[case::integer("3", Some(3.0))]
#[case::scientific("-2e2", Some(-200.0))]
#[case::hex("0x10", Some(16.0))]
#[case::not_a_number("abc", None)]
fn parse_double_cases(#[case] input: &str, #[case] expected: Option<f64>) {
    assert_eq!(parse_double(input), expected);
}

#[rstest]
#[case::int_passes(Variant::Int(5), Some(5))]
#[case::bool_widens(Variant::Bool(true), Some(1))]
#[case::double_truncates(Variant::Double(2.9), Some(2))]
#[case::string_parses(Variant::from("0x10"), Some(16))]
#[case::string_rejects(Variant::from("five"), None)]
#[case::null_rejects(Variant::Null, None)]
fn to_int_cases(#[case] input: Variant, #[case] expected: Option<i64>) {
    assert_eq!(input.to_int().ok(), expected);
}

#[rstest]
#[case::null(Variant::Null, Some("null"))]
#[case::bool_value(Variant::Bool(true), Some("true"))]
#[case::int_value(Variant::Int(-3), Some("-3"))]
#[case::double_value(Variant::Double(1.5), Some("1.5"))]
#[case::string_value(Variant::from("x"), Some("x"))]
#[case::array_rejects(Variant::Array(vec![]), None)]
fn to_string_cases(#[case] input: Variant, #[case] expected: Option<&str>) {
    assert_eq!(input.to_string_value().ok().as_deref(), expected);
}
