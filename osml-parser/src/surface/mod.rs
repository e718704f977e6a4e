//! Surface syntaxes
//!
//! Both surfaces translate their syntax into the same four events consumed
//! by the [`ParserStack`](crate::stack::ParserStack): `command_start`,
//! `annotation_start`/`annotation_end`, `data` and `range_end`. The OSML
//! surface is the backslash-command syntax; OSXML is an XML subset carrying
//! the same structure.

mod osml;
mod osxml;

pub use osml::OsmlParser;
pub use osxml::OsxmlParser;

use crate::stack::{ParserCallbacks, StateRegistry};
use crate::tokens::{TokenId, TokenRegistry, Tokenizer, WhitespaceMode, TOKEN_EMPTY};
use osml_core::diagnostics::Logger;
use osml_core::managed::{Manager, Rooted};
use std::rc::Rc;

/// Shared context a surface parser runs against.
#[derive(Clone)]
pub struct ParserEnv {
    pub manager: Manager,
    pub logger: Logger,
    pub states: Rc<StateRegistry>,
}

impl ParserEnv {
    /// Environment with the standard state table.
    pub fn new(manager: Manager, logger: Logger) -> Self {
        ParserEnv {
            manager,
            logger,
            states: Rc::new(crate::stack::standard::standard_registry()),
        }
    }

    pub fn with_states(manager: Manager, logger: Logger, states: Rc<StateRegistry>) -> Self {
        ParserEnv {
            manager,
            logger,
            states,
        }
    }
}

/// A surface parser: text in, top-level nodes out. Diagnostics go to the
/// environment's logger; a failed parse is a logger with `has_error()` set.
pub trait Parser {
    fn parse(&self, source: &str, env: &ParserEnv) -> Vec<Rooted>;
}

/// [`ParserCallbacks`] adapter giving handlers field-scoped access to the
/// tokenizer and the token registry of the running surface.
pub(crate) struct TokenizerCallbacks<'t, 'src> {
    pub tokenizer: &'t mut Tokenizer<'src>,
    pub registry: &'t mut TokenRegistry,
}

impl ParserCallbacks for TokenizerCallbacks<'_, '_> {
    fn set_whitespace_mode(&mut self, mode: WhitespaceMode) {
        self.tokenizer.set_whitespace_mode(mode);
    }

    fn register_token(&mut self, token: &str) -> TokenId {
        if !self.supports_token(token) {
            return TOKEN_EMPTY;
        }
        let id = self.registry.acquire(token);
        if id != TOKEN_EMPTY && self.registry.refs(id) == 1 {
            self.tokenizer.register_token(token, id);
        }
        id
    }

    fn unregister_token(&mut self, token: &str) -> bool {
        let id = self.registry.id_of(token);
        if id == TOKEN_EMPTY {
            return false;
        }
        if self.registry.release(id) && self.registry.name_of(id).is_none() {
            self.tokenizer.unregister_token(token);
        }
        true
    }

    fn supports_token(&self, token: &str) -> bool {
        !token.is_empty() && !token.contains(char::is_whitespace) && !token.contains('\\')
    }
}
