//! Tokens, the dynamic token trie and the tokenizer
//!
//! Token ids are plain `u32`s. User-defined tokens are allocated from the
//! bottom of the id space by the [`TokenRegistry`](registry::TokenRegistry);
//! the top 255 ids are reserved for special tokens the tokenizer emits on its
//! own (data runs, line breaks, indentation changes).

mod registry;
mod trie;
mod tokenizer;

pub use registry::{TokenDescriptorId, TokenRegistry, TokenStack, TokenSyntaxDescriptor};
pub use tokenizer::{DataAccumulator, Tokenizer};
pub use trie::TokenTrie;

use osml_core::source::SourceRange;
use serde::Serialize;

pub type TokenId = u32;

/// "No token": returned by trie lookups that find nothing.
pub const TOKEN_EMPTY: TokenId = u32::MAX;
/// A run of characters that matched no registered token.
pub const TOKEN_DATA: TokenId = u32::MAX - 1;
/// A single line break between content.
pub const TOKEN_NEWLINE: TokenId = u32::MAX - 2;
/// A blank line (two breaks separated only by whitespace).
pub const TOKEN_PARAGRAPH: TokenId = u32::MAX - 3;
/// Three or more breaks separated only by whitespace.
pub const TOKEN_SECTION: TokenId = u32::MAX - 4;
/// Leading whitespace grew past the previous non-blank line's.
pub const TOKEN_INDENT: TokenId = u32::MAX - 5;
/// Leading whitespace fell below an open indentation level.
pub const TOKEN_DEDENT: TokenId = u32::MAX - 6;
/// Introduces a command in surfaces that enable command recognition.
pub const TOKEN_COMMAND_INTRO: TokenId = u32::MAX - 7;

/// Largest id available to user-defined tokens.
pub const MAX_USER_TOKEN: TokenId = u32::MAX - 255;

pub fn is_special(id: TokenId) -> bool {
    id > MAX_USER_TOKEN
}

/// Printable name for diagnostics.
pub fn special_name(id: TokenId) -> Option<&'static str> {
    match id {
        TOKEN_EMPTY => Some("empty"),
        TOKEN_DATA => Some("data"),
        TOKEN_NEWLINE => Some("newline"),
        TOKEN_PARAGRAPH => Some("paragraph"),
        TOKEN_SECTION => Some("section"),
        TOKEN_INDENT => Some("indent"),
        TOKEN_DEDENT => Some("dedent"),
        TOKEN_COMMAND_INTRO => Some("command"),
        _ => None,
    }
}

/// How a field shapes whitespace inside `Data` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitespaceMode {
    /// Keep data exactly as written.
    Preserve,
    /// Strip leading and trailing whitespace from each data run.
    Trim,
    /// Trim, and squash every internal whitespace run to one space.
    #[default]
    Collapse,
}

/// One token: id, shaped content and the exact source bytes it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub id: TokenId,
    pub content: String,
    pub range: SourceRange,
}

impl Token {
    pub fn new(id: TokenId, content: impl Into<String>, range: SourceRange) -> Self {
        Token {
            id,
            content: content.into(),
            range,
        }
    }

    pub fn is_special(&self) -> bool {
        is_special(self.id)
    }
}
