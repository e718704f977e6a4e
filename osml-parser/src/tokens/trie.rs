//! Minimal prefix trie over a runtime-mutable token alphabet
//!
//! The trie is the longest-match engine behind the tokenizer. Tokens come and
//! go as fields open and close, so both insertion and removal keep the
//! structure minimal: after an unregister, no chain of nodes survives unless
//! it carries a terminal or branches.

use crate::tokens::{TokenId, TOKEN_EMPTY};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    terminal: Option<TokenId>,
}

impl TrieNode {
    fn is_prunable(&self) -> bool {
        self.terminal.is_none() && self.children.is_empty()
    }
}

/// Prefix trie mapping token strings to ids.
#[derive(Debug, Default)]
pub struct TokenTrie {
    root: TrieNode,
}

impl TokenTrie {
    pub fn new() -> Self {
        TokenTrie::default()
    }

    /// Associate `token` with `id`. Fails on the empty string and on a
    /// string that already has a terminal.
    pub fn register_token(&mut self, token: &str, id: TokenId) -> bool {
        if token.is_empty() {
            return false;
        }
        let mut node = &mut self.root;
        for c in token.chars() {
            node = node.children.entry(c).or_default();
        }
        if node.terminal.is_some() {
            return false;
        }
        node.terminal = Some(id);
        true
    }

    /// Remove `token`, pruning now-unused chain nodes bottom-up.
    pub fn unregister_token(&mut self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let chars: Vec<char> = token.chars().collect();
        Self::remove(&mut self.root, &chars).is_some()
    }

    // Recursive removal; Some(()) on the way back up means the token existed.
    fn remove(node: &mut TrieNode, rest: &[char]) -> Option<()> {
        match rest.split_first() {
            None => {
                node.terminal.take().map(|_| ())
            }
            Some((c, tail)) => {
                let child = node.children.get_mut(c)?;
                let hit = Self::remove(child, tail)?;
                if child.is_prunable() {
                    node.children.remove(c);
                }
                Some(hit)
            }
        }
    }

    /// Exact lookup; [`TOKEN_EMPTY`] when the string is not a token.
    pub fn has_token(&self, token: &str) -> TokenId {
        let mut node = &self.root;
        for c in token.chars() {
            match node.children.get(&c) {
                Some(next) => node = next,
                None => return TOKEN_EMPTY,
            }
        }
        node.terminal.unwrap_or(TOKEN_EMPTY)
    }

    /// True if some registered token starts with `c`.
    pub fn starts_token(&self, c: char) -> bool {
        self.root.children.contains_key(&c)
    }

    pub(crate) fn cursor(&self) -> TrieCursor<'_> {
        TrieCursor {
            node: Some(&self.root),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

/// Incremental descent used by the tokenizer's longest-match loop.
pub(crate) struct TrieCursor<'a> {
    node: Option<&'a TrieNode>,
}

impl<'a> TrieCursor<'a> {
    /// Step one character deeper; false once no token can match any more.
    pub fn step(&mut self, c: char) -> bool {
        self.node = self.node.and_then(|n| n.children.get(&c));
        self.node.is_some()
    }

    /// Terminal id at the current node, if the consumed prefix is a token.
    pub fn terminal(&self) -> Option<TokenId> {
        self.node.and_then(|n| n.terminal)
    }
}
