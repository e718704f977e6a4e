//! Core runtime for the OSML document engine
//!
//! This crate carries everything the surface parsers build on top of:
//!
//! * [`managed`]: the cycle-tolerant object graph that holds documents,
//!   ontologies and typesystems at runtime.
//! * [`rtti`]: name-based runtime type descriptors with `isa` and
//!   composition queries.
//! * [`variant`]: the dynamic value type stored in node data fields,
//!   including cardinality sets.
//! * [`source`]: positions, ranges, a normalizing character reader and
//!   context extraction for diagnostics.
//! * [`diagnostics`]: severities, the logger and transactional forks.
//!
//! Everything here is single-threaded: graph handles and loggers are
//! `Rc`-based and cheap to clone, never `Send`.

pub mod diagnostics;
pub mod managed;
pub mod rtti;
pub mod source;
pub mod variant;
