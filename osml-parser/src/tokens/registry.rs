//! Token id allocation and per-field syntax frames
//!
//! The [`TokenRegistry`] hands out user token ids for token strings with
//! reference counting, so the same string registered by several fields keeps
//! one id and the id returns to the free pool once the last user releases it.
//!
//! The [`TokenStack`] tracks which token syntaxes are active: each entered
//! field pushes one frame of [`TokenSyntaxDescriptor`]s, and lookups answer
//! against the top frame only.

use crate::tokens::{TokenId, WhitespaceMode, MAX_USER_TOKEN, TOKEN_EMPTY};
use std::collections::{BTreeSet, HashMap};

struct RegistryEntry {
    name: String,
    refs: usize,
}

/// Refcounted string→id allocation with id reuse.
#[derive(Default)]
pub struct TokenRegistry {
    by_name: HashMap<String, TokenId>,
    entries: HashMap<TokenId, RegistryEntry>,
    free: Vec<TokenId>,
    next: TokenId,
}

impl TokenRegistry {
    pub fn new() -> Self {
        TokenRegistry::default()
    }

    /// Id for `name`, allocating on first acquisition. Returns
    /// [`TOKEN_EMPTY`] when the user id space is exhausted.
    pub fn acquire(&mut self, name: &str) -> TokenId {
        if name.is_empty() {
            return TOKEN_EMPTY;
        }
        if let Some(id) = self.by_name.get(name) {
            let id = *id;
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.refs += 1;
            }
            return id;
        }
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                if self.next >= MAX_USER_TOKEN {
                    return TOKEN_EMPTY;
                }
                let id = self.next;
                self.next += 1;
                id
            }
        };
        self.by_name.insert(name.to_owned(), id);
        self.entries.insert(
            id,
            RegistryEntry {
                name: name.to_owned(),
                refs: 1,
            },
        );
        id
    }

    /// Drop one reference; true if the id was live. The id returns to the
    /// free pool when the last reference goes.
    pub fn release(&mut self, id: TokenId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            let name = self.entries.remove(&id).map(|e| e.name);
            if let Some(name) = name {
                self.by_name.remove(&name);
            }
            self.free.push(id);
        }
        true
    }

    pub fn id_of(&self, name: &str) -> TokenId {
        self.by_name.get(name).copied().unwrap_or(TOKEN_EMPTY)
    }

    pub fn name_of(&self, id: TokenId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    pub fn refs(&self, id: TokenId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.refs)
    }
}

/// Token syntax of one structured class or field: how instances open and
/// close, the optional short form, and how data inside is whitespaced.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSyntaxDescriptor {
    pub name: String,
    pub open: Option<TokenId>,
    pub close: Option<TokenId>,
    pub short: Option<TokenId>,
    pub whitespace_mode: WhitespaceMode,
    /// Lookup results are stable-sorted by descending precedence.
    pub precedence: i32,
}

impl TokenSyntaxDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        TokenSyntaxDescriptor {
            name: name.into(),
            open: None,
            close: None,
            short: None,
            whitespace_mode: WhitespaceMode::default(),
            precedence: 0,
        }
    }

    pub fn open(mut self, id: TokenId) -> Self {
        self.open = Some(id);
        self
    }

    pub fn close(mut self, id: TokenId) -> Self {
        self.close = Some(id);
        self
    }

    pub fn short(mut self, id: TokenId) -> Self {
        self.short = Some(id);
        self
    }

    pub fn whitespace(mut self, mode: WhitespaceMode) -> Self {
        self.whitespace_mode = mode;
        self
    }

    pub fn precedence(mut self, p: i32) -> Self {
        self.precedence = p;
        self
    }
}

pub type TokenDescriptorId = usize;

/// Roles a token id can play in the active frame.
#[derive(Debug, Default)]
pub struct TokenLookup<'a> {
    pub open: Vec<&'a TokenSyntaxDescriptor>,
    pub close: Vec<&'a TokenSyntaxDescriptor>,
    pub short: Vec<&'a TokenSyntaxDescriptor>,
}

impl<'a> TokenLookup<'a> {
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.close.is_empty() && self.short.is_empty()
    }
}

/// Stack of active syntax frames, one per entered field.
#[derive(Default)]
pub struct TokenStack {
    frames: Vec<Vec<TokenSyntaxDescriptor>>,
}

impl TokenStack {
    pub fn new() -> Self {
        TokenStack::default()
    }

    pub fn push_frame(&mut self, descriptors: Vec<TokenSyntaxDescriptor>) {
        self.frames.push(descriptors);
    }

    pub fn pop_frame(&mut self) -> bool {
        self.frames.pop().is_some()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Ids active on the top frame.
    pub fn tokens(&self) -> BTreeSet<TokenId> {
        let mut out = BTreeSet::new();
        if let Some(top) = self.frames.last() {
            for d in top {
                out.extend(d.open);
                out.extend(d.close);
                out.extend(d.short);
            }
        }
        out
    }

    /// Descriptors of the top frame in which `id` appears, per role,
    /// stable-sorted by descending precedence.
    pub fn lookup(&self, id: TokenId) -> TokenLookup<'_> {
        let mut result = TokenLookup::default();
        let Some(top) = self.frames.last() else {
            return result;
        };
        for d in top {
            if d.open == Some(id) {
                result.open.push(d);
            }
            if d.close == Some(id) {
                result.close.push(d);
            }
            if d.short == Some(id) {
                result.short.push(d);
            }
        }
        let by_precedence =
            |a: &&TokenSyntaxDescriptor, b: &&TokenSyntaxDescriptor| b.precedence.cmp(&a.precedence);
        result.open.sort_by(by_precedence);
        result.close.sort_by(by_precedence);
        result.short.sort_by(by_precedence);
        result
    }
}
