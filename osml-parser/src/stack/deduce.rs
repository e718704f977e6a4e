//! State-path deduction
//!
//! When a command name does not match a state reachable from the current
//! frame directly, the stack deduces the chain of intermediate states: a walk
//! from the root pseudo-state through permitted-parent edges ending in a
//! state with the requested name, such that the names already on the stack
//! appear along the walk in order (extra states along the walk are the
//! permitted "gaps"). Exactly one such chain must exist; several make the
//! command ambiguous, none make it illegal.

use crate::stack::{ParserState, StateRegistry, ROOT_STATE, WILDCARD_STATE};
use std::collections::HashSet;
use std::rc::Rc;

/// Result of a deduction run.
#[derive(Debug)]
pub enum Deduction {
    /// The single chain of states from the root to the target, in push order.
    Unique(Vec<Rc<ParserState>>),
    /// Number of distinct chains found.
    Ambiguous(usize),
    None,
}

impl Deduction {
    pub fn is_unique(&self) -> bool {
        matches!(self, Deduction::Unique(_))
    }
}

/// Find chains reaching a state named `target` that embed `signature` (the
/// state names currently on the stack, bottom first) in order with gaps.
pub fn deduce_path(registry: &StateRegistry, signature: &[&str], target: &str) -> Deduction {
    let mut chains: Vec<Vec<Rc<ParserState>>> = Vec::new();
    let mut walk: Vec<Rc<ParserState>> = Vec::new();
    let mut seen: HashSet<(String, usize)> = HashSet::new();
    descend(
        registry,
        ROOT_STATE,
        signature,
        0,
        target,
        &mut walk,
        &mut seen,
        &mut chains,
    );
    match chains.len() {
        0 => Deduction::None,
        1 => chains.pop().map_or(Deduction::None, Deduction::Unique),
        n => Deduction::Ambiguous(n),
    }
}

#[allow(clippy::too_many_arguments)]
fn descend(
    registry: &StateRegistry,
    at: &str,
    signature: &[&str],
    consumed: usize,
    target: &str,
    walk: &mut Vec<Rc<ParserState>>,
    seen: &mut HashSet<(String, usize)>,
    chains: &mut Vec<Vec<Rc<ParserState>>>,
) {
    // Cut off once a second chain is known; the caller only distinguishes
    // zero, one and many.
    if chains.len() > 1 {
        return;
    }
    for state in registry.children_of(at) {
        if state.name == WILDCARD_STATE {
            continue;
        }
        let key = (state.name.to_owned(), consumed);
        if !seen.insert(key.clone()) {
            continue;
        }
        let consumed_here = if consumed < signature.len() && signature[consumed] == state.name {
            consumed + 1
        } else {
            consumed
        };
        walk.push(state.clone());
        if state.name == target && consumed_here == signature.len() {
            chains.push(walk.clone());
        } else {
            descend(
                registry,
                state.name,
                signature,
                consumed_here,
                target,
                walk,
                seen,
                chains,
            );
        }
        walk.pop();
        seen.remove(&key);
    }
}
