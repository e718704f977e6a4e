//! Parsing frontends for the OSML document graph
//!
//! The pipeline: a [`surface`] parser (OSML or OSXML) drives a
//! [`tokens::Tokenizer`] and reduces its syntax to four events, the
//! [`stack::ParserStack`] matches those events against a state table and
//! runs handlers that build nodes in an `osml_core` graph, and the
//! [`scope::ParserScope`] defers name references until their targets exist.
//! The [`resource`] module locates and caches whole modules so includes
//! resolve to shared graphs.

pub mod resource;
pub mod scope;
pub mod stack;
pub mod surface;
pub mod tokens;
