//! Sum-typed dynamic values
//!
//! [`Variant`] is the dynamic value type used for command arguments, node
//! data, and primitive document content. It carries one of nine payloads
//! (null, bool, int, double, string, array, map, cardinality, object) and
//! exposes two access styles:
//!
//! - **Strict accessors** (`as_*`) fail with a [`TypeError`] naming the
//!   actual and the requested type when the active variant is wrong.
//! - **Coercions** (`to_string_value`, `to_int`, `to_double`) convert where a
//!   conversion is defined: string rendering for scalar variants, numeric
//!   parsing for strings (with `0x`/`0X` hex prefixes and scientific
//!   notation). Non-scalar to scalar coercion fails.
//!
//! Ordering is total: variants rank by kind first, then compare
//! lexicographically within a kind (`f64` uses `total_cmp`). Maps compare as
//! unordered sets of pairs (the `BTreeMap` representation canonicalizes the
//! order), arrays in element order.

pub mod cardinality;

pub use cardinality::{Cardinality, CardinalityRange};

use crate::managed::WeakHandle;
use crate::rtti::{types, RttiType};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub type VariantArray = Vec<Variant>;
pub type VariantMap = BTreeMap<String, Variant>;

/// Strict accessor failure: the active variant did not match the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeError {
    pub actual: &'static RttiType,
    pub requested: &'static RttiType,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type mismatch: requested {}, got {}",
            self.requested, self.actual
        )
    }
}

impl std::error::Error for TypeError {}

/// A dynamic value.
#[derive(Debug, Clone, Default)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(VariantArray),
    Map(VariantMap),
    Cardinality(Cardinality),
    /// A reference to a managed node; weak, so liveness is observed at read
    /// time rather than forced by the data side channel.
    Object(WeakHandle),
}

impl Variant {
    pub fn rtti(&self) -> &'static RttiType {
        match self {
            Variant::Null => &types::NULL,
            Variant::Bool(_) => &types::BOOL,
            Variant::Int(_) => &types::INT,
            Variant::Double(_) => &types::DOUBLE,
            Variant::String(_) => &types::STRING,
            Variant::Array(_) => &types::ARRAY,
            Variant::Map(_) => &types::MAP,
            Variant::Cardinality(_) => &types::CARDINALITY,
            Variant::Object(_) => &types::NODE,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// True for the scalar variants that coerce to strings.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Variant::Null
                | Variant::Bool(_)
                | Variant::Int(_)
                | Variant::Double(_)
                | Variant::String(_)
        )
    }

    fn mismatch(&self, requested: &'static RttiType) -> TypeError {
        TypeError {
            actual: self.rtti(),
            requested,
        }
    }

    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Variant::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(&types::BOOL)),
        }
    }

    pub fn as_int(&self) -> Result<i64, TypeError> {
        match self {
            Variant::Int(i) => Ok(*i),
            _ => Err(self.mismatch(&types::INT)),
        }
    }

    pub fn as_double(&self) -> Result<f64, TypeError> {
        match self {
            Variant::Double(d) => Ok(*d),
            _ => Err(self.mismatch(&types::DOUBLE)),
        }
    }

    pub fn as_str(&self) -> Result<&str, TypeError> {
        match self {
            Variant::String(s) => Ok(s),
            _ => Err(self.mismatch(&types::STRING)),
        }
    }

    pub fn as_array(&self) -> Result<&VariantArray, TypeError> {
        match self {
            Variant::Array(a) => Ok(a),
            _ => Err(self.mismatch(&types::ARRAY)),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut VariantArray, TypeError> {
        match self {
            Variant::Array(a) => Ok(a),
            _ => Err(self.mismatch(&types::ARRAY)),
        }
    }

    pub fn as_map(&self) -> Result<&VariantMap, TypeError> {
        match self {
            Variant::Map(m) => Ok(m),
            _ => Err(self.mismatch(&types::MAP)),
        }
    }

    pub fn as_map_mut(&mut self) -> Result<&mut VariantMap, TypeError> {
        match self {
            Variant::Map(m) => Ok(m),
            _ => Err(self.mismatch(&types::MAP)),
        }
    }

    pub fn as_cardinality(&self) -> Result<&Cardinality, TypeError> {
        match self {
            Variant::Cardinality(c) => Ok(c),
            _ => Err(self.mismatch(&types::CARDINALITY)),
        }
    }

    pub fn as_object(&self) -> Result<&WeakHandle, TypeError> {
        match self {
            Variant::Object(h) => Ok(h),
            _ => Err(self.mismatch(&types::NODE)),
        }
    }

    /// String coercion, defined for scalar variants only.
    pub fn to_string_value(&self) -> Result<String, TypeError> {
        match self {
            Variant::Null => Ok("null".to_string()),
            Variant::Bool(b) => Ok(b.to_string()),
            Variant::Int(i) => Ok(i.to_string()),
            Variant::Double(d) => Ok(d.to_string()),
            Variant::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch(&types::STRING)),
        }
    }

    /// Integer coercion: ints pass through, bools map to 0/1, doubles
    /// truncate, strings parse.
    pub fn to_int(&self) -> Result<i64, TypeError> {
        match self {
            Variant::Int(i) => Ok(*i),
            Variant::Bool(b) => Ok(*b as i64),
            Variant::Double(d) => Ok(*d as i64),
            Variant::String(s) => parse_int(s).ok_or(self.mismatch(&types::INT)),
            _ => Err(self.mismatch(&types::INT)),
        }
    }

    /// Double coercion: doubles pass through, ints widen, strings parse.
    pub fn to_double(&self) -> Result<f64, TypeError> {
        match self {
            Variant::Double(d) => Ok(*d),
            Variant::Int(i) => Ok(*i as f64),
            Variant::Bool(b) => Ok(*b as i64 as f64),
            Variant::String(s) => parse_double(s).ok_or(self.mismatch(&types::DOUBLE)),
            _ => Err(self.mismatch(&types::DOUBLE)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Variant::Null => 0,
            Variant::Bool(_) => 1,
            Variant::Int(_) => 2,
            Variant::Double(_) => 3,
            Variant::String(_) => 4,
            Variant::Array(_) => 5,
            Variant::Map(_) => 6,
            Variant::Cardinality(_) => 7,
            Variant::Object(_) => 8,
        }
    }

    /// Total order: by kind rank, then lexicographic within the kind.
    pub fn total_cmp(&self, other: &Variant) -> Ordering {
        use Variant::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.total_cmp(y) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Map(a), Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    match ka.cmp(kb) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                    match va.total_cmp(vb) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Cardinality(a), Cardinality(b)) => a.cmp(b),
            (Object(a), Object(b)) => a.id().cmp(&b.id()),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.total_cmp(other))
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<VariantArray> for Variant {
    fn from(v: VariantArray) -> Self {
        Variant::Array(v)
    }
}

impl From<VariantMap> for Variant {
    fn from(v: VariantMap) -> Self {
        Variant::Map(v)
    }
}

impl From<Cardinality> for Variant {
    fn from(v: Cardinality) -> Self {
        Variant::Cardinality(v)
    }
}

/// Parse an integer literal: optional sign, decimal or `0x`/`0X` hex.
/// Falls back to double parsing (truncating) for scientific notation.
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Ok(v) = digits.parse::<i64>() {
        v
    } else {
        let d = parse_double(digits)?;
        if !d.is_finite() {
            return None;
        }
        d.trunc() as i64
    };
    Some(if neg { -value } else { value })
}

/// Parse a floating point literal, accepting `0x`/`0X` hex integers and
/// scientific notation.
pub fn parse_double(s: &str) -> Option<f64> {
    let t = s.trim();
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()? as f64
    } else {
        digits.parse::<f64>().ok()?
    };
    Some(if neg { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtti_of_variants() {
        assert_eq!(Variant::Null.rtti().name(), "null");
        assert_eq!(Variant::Int(1).rtti().name(), "int");
        assert_eq!(Variant::from("x").rtti().name(), "string");
        assert_eq!(Variant::Array(vec![]).rtti().name(), "array");
    }

    #[test]
    fn test_strict_accessor_mismatch() {
        let v = Variant::Int(3);
        let err = v.as_str().unwrap_err();
        assert_eq!(err.actual.name(), "int");
        assert_eq!(err.requested.name(), "string");
        assert!(v.as_int().is_ok());
    }

    #[test]
    fn test_to_string_scalars_only() {
        assert_eq!(Variant::Null.to_string_value().unwrap(), "null");
        assert_eq!(Variant::Bool(true).to_string_value().unwrap(), "true");
        assert_eq!(Variant::Int(-4).to_string_value().unwrap(), "-4");
        assert!(Variant::Array(vec![]).to_string_value().is_err());
        assert!(Variant::Map(VariantMap::new()).to_string_value().is_err());
    }

    #[test]
    fn test_to_int_parses_strings() {
        assert_eq!(Variant::from("42").to_int().unwrap(), 42);
        assert_eq!(Variant::from("0x10").to_int().unwrap(), 16);
        assert_eq!(Variant::from("0X1f").to_int().unwrap(), 31);
        assert_eq!(Variant::from("-0x10").to_int().unwrap(), -16);
        assert_eq!(Variant::from("1e3").to_int().unwrap(), 1000);
        assert!(Variant::from("not a number").to_int().is_err());
    }

    #[test]
    fn test_to_double_parses_strings() {
        assert_eq!(Variant::from("2.5").to_double().unwrap(), 2.5);
        assert_eq!(Variant::from("1e-2").to_double().unwrap(), 0.01);
        assert_eq!(Variant::from("0x10").to_double().unwrap(), 16.0);
        assert_eq!(Variant::Int(3).to_double().unwrap(), 3.0);
    }

    #[test]
    fn test_cross_variant_order_by_rank() {
        assert!(Variant::Null < Variant::Bool(false));
        assert!(Variant::Bool(true) < Variant::Int(i64::MIN));
        assert!(Variant::Int(i64::MAX) < Variant::Double(f64::NEG_INFINITY));
        assert!(Variant::from("") > Variant::Double(f64::INFINITY));
    }

    #[test]
    fn test_array_order_is_lexicographic() {
        let a = Variant::Array(vec![Variant::Int(1), Variant::Int(2)]);
        let b = Variant::Array(vec![Variant::Int(1), Variant::Int(3)]);
        let c = Variant::Array(vec![Variant::Int(1)]);
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn test_map_equality_is_unordered() {
        let mut a = VariantMap::new();
        a.insert("x".into(), Variant::Int(1));
        a.insert("y".into(), Variant::Int(2));

        let mut b = VariantMap::new();
        b.insert("y".into(), Variant::Int(2));
        b.insert("x".into(), Variant::Int(1));

        assert_eq!(Variant::Map(a), Variant::Map(b));
    }

    #[test]
    fn test_double_total_order_handles_nan() {
        let nan = Variant::Double(f64::NAN);
        assert_eq!(nan.total_cmp(&nan), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_assignment_changes_variant() {
        let mut v = Variant::Int(1);
        v = Variant::from("now a string");
        assert_eq!(v.rtti().name(), "string");
    }
}
