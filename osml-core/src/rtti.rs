//! Named runtime types with "is-a" and "composed-of" relations
//!
//! Every managed node and every [`Variant`](crate::variant::Variant) value
//! answers `rtti()` with a reference to a [`RttiType`] descriptor. Descriptors
//! form a graph: `parents` is the "is-a" relation, `composed` the
//! "contains instances of" relation; both queries take the transitive closure.
//!
//! The well-known descriptors live in [`types`] as `once_cell::sync::Lazy`
//! statics. A process-wide table keyed by native type identity
//! (`std::any::TypeId`) lets generic code look up the descriptor for a Rust
//! type; looking up an unregistered type yields the sentinel
//! [`types::NONE`] whose name is `"unknown"`.

use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

/// A named runtime type descriptor.
///
/// Equality and hashing are by name; names are unique within a process.
pub struct RttiType {
    name: &'static str,
    parents: Vec<&'static RttiType>,
    composed: Vec<&'static RttiType>,
}

impl RttiType {
    pub fn new(
        name: &'static str,
        parents: Vec<&'static RttiType>,
        composed: Vec<&'static RttiType>,
    ) -> Self {
        RttiType {
            name,
            parents,
            composed,
        }
    }

    /// Create a descriptor for a runtime-defined kind. The descriptor is
    /// leaked; descriptors live for the whole process by design.
    pub fn dynamic(
        name: String,
        parents: Vec<&'static RttiType>,
        composed: Vec<&'static RttiType>,
    ) -> &'static RttiType {
        Box::leak(Box::new(RttiType {
            name: Box::leak(name.into_boxed_str()),
            parents,
            composed,
        }))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parents(&self) -> &[&'static RttiType] {
        &self.parents
    }

    pub fn composed(&self) -> &[&'static RttiType] {
        &self.composed
    }

    /// All types this type is-a, including itself.
    fn isa_closure(&self) -> HashSet<&'static str> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&RttiType> = vec![self];
        while let Some(ty) = stack.pop() {
            if seen.insert(ty.name) {
                stack.extend(ty.parents.iter().copied());
            }
        }
        seen
    }

    /// Reflexive, transitive "is-a" query.
    pub fn isa(&self, other: &RttiType) -> bool {
        self.isa_closure().contains(other.name)
    }

    /// Transitive "contains instances of" query, propagating through parents
    /// and through the composed types themselves.
    pub fn composed_of(&self, other: &RttiType) -> bool {
        let mut seen: HashSet<&'static str> = HashSet::new();
        let mut stack: Vec<&RttiType> = vec![self];
        let mut composed: Vec<&'static RttiType> = Vec::new();
        // Direct composed set of the isa closure.
        while let Some(ty) = stack.pop() {
            if seen.insert(ty.name) {
                composed.extend(ty.composed.iter().copied());
                stack.extend(ty.parents.iter().copied());
            }
        }
        // Expand transitively through the composed types.
        let mut expanded: HashSet<&'static str> = HashSet::new();
        while let Some(ty) = composed.pop() {
            if expanded.insert(ty.name) {
                if other.isa(ty) {
                    return true;
                }
                composed.extend(ty.composed.iter().copied());
                for parent in ty.parents.iter() {
                    composed.extend(parent.composed.iter().copied());
                }
            }
        }
        false
    }
}

impl PartialEq for RttiType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RttiType {}

impl Hash for RttiType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for RttiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RttiType({})", self.name)
    }
}

impl fmt::Display for RttiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An unordered set of type descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RttiSet(pub Vec<&'static RttiType>);

impl RttiSet {
    pub fn new(types: Vec<&'static RttiType>) -> Self {
        RttiSet(types)
    }

    pub fn contains(&self, ty: &RttiType) -> bool {
        self.0.iter().any(|t| *t == ty)
    }

    /// True if `ty` is-a member of this set.
    pub fn accepts(&self, ty: &RttiType) -> bool {
        self.0.iter().any(|t| ty.isa(t))
    }

    pub fn intersects(&self, other: &RttiSet) -> bool {
        self.0.iter().any(|t| other.accepts(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static RttiType> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<&'static RttiType>> for RttiSet {
    fn from(types: Vec<&'static RttiType>) -> Self {
        RttiSet(types)
    }
}

/// Well-known type descriptors.
pub mod types {
    use super::*;

    /// Sentinel for unregistered native types.
    pub static NONE: Lazy<RttiType> = Lazy::new(|| RttiType::new("unknown", vec![], vec![]));

    pub static NULL: Lazy<RttiType> = Lazy::new(|| RttiType::new("null", vec![], vec![]));
    pub static BOOL: Lazy<RttiType> = Lazy::new(|| RttiType::new("bool", vec![], vec![]));
    pub static INT: Lazy<RttiType> = Lazy::new(|| RttiType::new("int", vec![], vec![]));
    pub static DOUBLE: Lazy<RttiType> = Lazy::new(|| RttiType::new("double", vec![], vec![]));
    pub static STRING: Lazy<RttiType> = Lazy::new(|| RttiType::new("string", vec![], vec![]));
    pub static ARRAY: Lazy<RttiType> = Lazy::new(|| RttiType::new("array", vec![], vec![]));
    pub static MAP: Lazy<RttiType> = Lazy::new(|| RttiType::new("map", vec![], vec![]));
    pub static CARDINALITY: Lazy<RttiType> =
        Lazy::new(|| RttiType::new("cardinality", vec![], vec![]));

    /// Base type of every managed node.
    pub static NODE: Lazy<RttiType> = Lazy::new(|| RttiType::new("node", vec![], vec![]));

    pub static ANNOTATION: Lazy<RttiType> =
        Lazy::new(|| RttiType::new("annotation", vec![&*NODE], vec![]));
    pub static FIELD: Lazy<RttiType> = Lazy::new(|| RttiType::new("field", vec![&*NODE], vec![]));
    pub static STRUCTURED_CLASS: Lazy<RttiType> =
        Lazy::new(|| RttiType::new("structuredClass", vec![&*NODE], vec![&*FIELD]));
    pub static TYPESYSTEM: Lazy<RttiType> =
        Lazy::new(|| RttiType::new("typesystem", vec![&*NODE], vec![]));
    pub static ONTOLOGY: Lazy<RttiType> = Lazy::new(|| {
        RttiType::new(
            "ontology",
            vec![&*NODE],
            vec![&*STRUCTURED_CLASS, &*ANNOTATION],
        )
    });
    pub static DOCUMENT: Lazy<RttiType> =
        Lazy::new(|| RttiType::new("document", vec![&*NODE], vec![&*NODE, &*ANNOTATION]));
}

static NATIVE_TABLE: Lazy<RwLock<HashMap<TypeId, &'static RttiType>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Associate a native Rust type with a descriptor.
pub fn register_native<T: 'static>(ty: &'static RttiType) {
    NATIVE_TABLE
        .write()
        .expect("rtti table poisoned")
        .insert(TypeId::of::<T>(), ty);
}

/// Look up the descriptor registered for a native Rust type.
///
/// Returns [`types::NONE`] for unregistered types.
pub fn rtti_of<T: 'static>() -> &'static RttiType {
    NATIVE_TABLE
        .read()
        .expect("rtti table poisoned")
        .get(&TypeId::of::<T>())
        .copied()
        .unwrap_or(&types::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isa_is_reflexive() {
        assert!(types::NODE.isa(&types::NODE));
        assert!(types::DOCUMENT.isa(&types::DOCUMENT));
    }

    #[test]
    fn test_isa_is_transitive() {
        static GRANDCHILD: Lazy<RttiType> =
            Lazy::new(|| RttiType::new("isa-grandchild", vec![&*CHILD], vec![]));
        static CHILD: Lazy<RttiType> =
            Lazy::new(|| RttiType::new("isa-child", vec![&*types::DOCUMENT], vec![]));

        assert!(GRANDCHILD.isa(&types::DOCUMENT));
        assert!(GRANDCHILD.isa(&types::NODE));
        assert!(!types::NODE.isa(&GRANDCHILD));
    }

    #[test]
    fn test_isa_multiple_parents() {
        static BOTH: Lazy<RttiType> = Lazy::new(|| {
            RttiType::new(
                "isa-both",
                vec![&*types::DOCUMENT, &*types::ONTOLOGY],
                vec![],
            )
        });
        assert!(BOTH.isa(&types::DOCUMENT));
        assert!(BOTH.isa(&types::ONTOLOGY));
        assert!(BOTH.isa(&types::NODE));
    }

    #[test]
    fn test_composed_of_is_not_reflexive() {
        assert!(!types::ONTOLOGY.composed_of(&types::ONTOLOGY));
    }

    #[test]
    fn test_composed_of_direct_and_transitive() {
        assert!(types::ONTOLOGY.composed_of(&types::STRUCTURED_CLASS));
        // ontology contains structuredClass, which contains field
        assert!(types::ONTOLOGY.composed_of(&types::FIELD));
        assert!(!types::TYPESYSTEM.composed_of(&types::FIELD));
    }

    #[test]
    fn test_composed_of_propagates_through_parents() {
        static SPECIAL_DOC: Lazy<RttiType> =
            Lazy::new(|| RttiType::new("composed-special-doc", vec![&*types::DOCUMENT], vec![]));
        assert!(SPECIAL_DOC.composed_of(&types::ANNOTATION));
    }

    #[test]
    fn test_composed_of_accepts_subtypes() {
        // document is composed of node, so it is composed of any node subtype
        assert!(types::DOCUMENT.composed_of(&types::STRUCTURED_CLASS));
    }

    #[test]
    fn test_native_lookup_unregistered_is_none() {
        struct Unregistered;
        let ty = rtti_of::<Unregistered>();
        assert_eq!(ty.name(), "unknown");
    }

    #[test]
    fn test_native_registration() {
        struct Registered;
        register_native::<Registered>(&types::DOCUMENT);
        assert_eq!(rtti_of::<Registered>().name(), "document");
    }

    #[test]
    fn test_dynamic_type() {
        let ty = RttiType::dynamic("widget".to_string(), vec![&*types::NODE], vec![]);
        assert!(ty.isa(&types::NODE));
        assert_eq!(ty.name(), "widget");
    }

    #[test]
    fn test_set_accepts() {
        let set = RttiSet::new(vec![&*types::NODE]);
        assert!(set.accepts(&types::DOCUMENT));
        assert!(!set.contains(&types::DOCUMENT));
        assert!(set.contains(&types::NODE));
    }
}
