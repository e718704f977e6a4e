//! Source buffer access: code point reading, positions, and context slices.

pub mod context;
pub mod range;
pub mod reader;

pub use context::{SourceContext, SourceContextReader};
pub use range::{SourcePosition, SourceRange};
pub use reader::CharReader;
