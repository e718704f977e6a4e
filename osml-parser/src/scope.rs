//! Parser scope and deferred name resolution
//!
//! The scope tracks the path of nodes the parser is currently inside. On top
//! of it sits the resolver: handlers post typed path-resolution requests that
//! are answered immediately when the target already exists, or parked and
//! retried as new nodes are defined. A request may supply an imposter
//! callback producing a placeholder node for forward references; the result
//! callback then runs twice, once with the placeholder and once with the real
//! node when it appears.
//!
//! Unresolved requests are reported at [`ParserScope::flush`], each as one
//! `Error` diagnostic at the request's original source range.

use osml_core::diagnostics::Logger;
use osml_core::managed::Rooted;
use osml_core::rtti::RttiType;
use osml_core::source::SourceRange;
use std::collections::VecDeque;
use std::rc::Rc;

/// Per-frame context flags for context-sensitive syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFlag {
    /// Body content has begun; header-only constructs are no longer legal.
    PostHead,
}

/// `(resolved, owner, logger)`; invoked for placeholder and real results.
pub type ResolutionCallback = Rc<dyn Fn(&Rooted, &Rooted, &Logger)>;
/// Produces a placeholder node for a forward reference.
pub type ImposterCallback = Rc<dyn Fn() -> Rooted>;

struct PendingRequest {
    path: Vec<String>,
    expected: &'static RttiType,
    owner: Rooted,
    /// Scope path at post time, leaf last.
    scope_path: Vec<Rooted>,
    callback: ResolutionCallback,
    /// Placeholder already delivered, awaiting replacement.
    imposter: Option<Rooted>,
    range: SourceRange,
}

/// Outcome of one immediate resolution attempt.
enum Attempt {
    Unique(Rooted),
    Ambiguous(Vec<Rooted>),
    Miss,
}

#[derive(Default)]
pub struct ParserScope {
    path: Vec<Rooted>,
    flags: Vec<(usize, ScopeFlag)>,
    pending: VecDeque<PendingRequest>,
}

impl ParserScope {
    pub fn new() -> Self {
        ParserScope::default()
    }

    pub fn push(&mut self, node: Rooted) {
        self.path.push(node);
    }

    pub fn pop(&mut self) -> Option<Rooted> {
        let node = self.path.pop();
        let depth = self.path.len();
        self.flags.retain(|(d, _)| *d <= depth);
        node
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn leaf(&self) -> Option<&Rooted> {
        self.path.last()
    }

    /// Nearest enclosing node whose type is `filter`, leaf-first.
    pub fn select(&self, filter: &'static RttiType) -> Option<&Rooted> {
        self.path.iter().rev().find(|n| n.rtti().isa(filter))
    }

    /// Set `flag` on the current frame; it is cleared when the frame pops.
    pub fn set_flag(&mut self, flag: ScopeFlag) {
        if !self.get_flag(flag) {
            self.flags.push((self.path.len(), flag));
        }
    }

    pub fn get_flag(&self, flag: ScopeFlag) -> bool {
        self.flags.iter().any(|(_, f)| *f == flag)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Post a resolution request. Returns true if the request retired
    /// immediately (resolved or failed); false if it was parked.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &mut self,
        path: &[&str],
        expected: &'static RttiType,
        owner: Rooted,
        range: SourceRange,
        logger: &Logger,
        callback: ResolutionCallback,
        imposter: Option<ImposterCallback>,
    ) -> bool {
        let path: Vec<String> = path.iter().map(|s| (*s).to_owned()).collect();
        match Self::attempt(&self.path, &path, expected) {
            Attempt::Unique(node) => {
                callback(&node, &owner, logger);
                true
            }
            Attempt::Ambiguous(candidates) => {
                Self::report_ambiguous(logger, &path, &candidates, range);
                true
            }
            Attempt::Miss => {
                let imposter_node = imposter.map(|make| {
                    let placeholder = make();
                    callback(&placeholder, &owner, logger);
                    placeholder
                });
                self.pending.push_back(PendingRequest {
                    path,
                    expected,
                    owner,
                    scope_path: self.path.clone(),
                    callback,
                    imposter: imposter_node,
                    range,
                });
                false
            }
        }
    }

    /// Re-attempt every parked request in FIFO order. Called after each
    /// top-level node creation.
    pub fn retry_all(&mut self, logger: &Logger) {
        let mut still_pending = VecDeque::new();
        while let Some(request) = self.pending.pop_front() {
            match Self::attempt(&request.scope_path, &request.path, request.expected) {
                Attempt::Unique(node) => {
                    (request.callback)(&node, &request.owner, logger);
                }
                Attempt::Ambiguous(candidates) => {
                    Self::report_ambiguous(logger, &request.path, &candidates, request.range);
                }
                Attempt::Miss => still_pending.push_back(request),
            }
        }
        self.pending = still_pending;
    }

    /// End-of-parse: one final retry, then an `Error` diagnostic per
    /// remaining request at its original location. Requests satisfied by an
    /// imposter still report, since the placeholder was never replaced.
    pub fn flush(&mut self, logger: &Logger) {
        self.retry_all(logger);
        while let Some(request) = self.pending.pop_front() {
            let what = if request.imposter.is_some() {
                "placeholder was never replaced"
            } else {
                "reference could not be resolved"
            };
            logger.error(
                format!(
                    "{}: \"{}\" (expected {})",
                    what,
                    request.path.join("."),
                    request.expected.name()
                ),
                Some(request.range),
            );
        }
    }

    fn attempt(scope_path: &[Rooted], path: &[String], expected: &'static RttiType) -> Attempt {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let mut matches: Vec<Rooted> = Vec::new();
        for node in scope_path.iter().rev() {
            for hit in node.resolve(&segments, expected) {
                if !matches.iter().any(|m| m.id() == hit.id()) {
                    matches.push(hit);
                }
            }
            // Leaf-first: the innermost frame that matches wins.
            if !matches.is_empty() {
                break;
            }
        }
        match matches.len() {
            0 => Attempt::Miss,
            1 => Attempt::Unique(matches.remove(0)),
            _ => Attempt::Ambiguous(matches),
        }
    }

    fn report_ambiguous(logger: &Logger, path: &[String], candidates: &[Rooted], range: SourceRange) {
        let names: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} ({})", c.name(), c.rtti().name()))
            .collect();
        logger.error(
            format!(
                "ambiguous reference \"{}\": candidates are {}",
                path.join("."),
                names.join(", ")
            ),
            Some(range),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osml_core::managed::Manager;
    use osml_core::rtti::types;
    use std::cell::RefCell;

    fn counter_cb(hits: Rc<RefCell<Vec<u64>>>) -> ResolutionCallback {
        Rc::new(move |resolved, _owner, _logger| hits.borrow_mut().push(resolved.id()))
    }

    #[test]
    fn test_select_nearest_ancestor() {
        let mgr = Manager::new();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let field = mgr.create(&types::FIELD, "f");
        let mut scope = ParserScope::new();
        scope.push(doc.clone());
        scope.push(field.clone());
        assert_eq!(scope.select(&types::DOCUMENT).map(|n| n.id()), Some(doc.id()));
        assert_eq!(scope.select(&types::FIELD).map(|n| n.id()), Some(field.id()));
        assert_eq!(scope.select(&types::ONTOLOGY).map(|n| n.id()), None);
    }

    #[test]
    fn test_flags_cleared_on_pop() {
        let mgr = Manager::new();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let mut scope = ParserScope::new();
        scope.push(doc.clone());
        scope.push(doc.clone());
        scope.set_flag(ScopeFlag::PostHead);
        assert!(scope.get_flag(ScopeFlag::PostHead));
        scope.pop();
        assert!(!scope.get_flag(ScopeFlag::PostHead));
    }

    #[test]
    fn test_immediate_resolution() {
        let mgr = Manager::new();
        let logger = Logger::default();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let target = mgr.create(&types::FIELD, "x");
        doc.adopt(&target).unwrap();

        let mut scope = ParserScope::new();
        scope.push(doc.clone());
        let hits = Rc::new(RefCell::new(Vec::new()));
        let retired = scope.resolve(
            &["x"],
            &types::FIELD,
            doc.clone(),
            SourceRange::at(0),
            &logger,
            counter_cb(hits.clone()),
            None,
        );
        assert!(retired);
        assert_eq!(*hits.borrow(), vec![target.id()]);
        assert_eq!(scope.pending_count(), 0);
    }

    #[test]
    fn test_forward_reference_resolves_on_retry() {
        let mgr = Manager::new();
        let logger = Logger::default();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let mut scope = ParserScope::new();
        scope.push(doc.clone());

        let hits = Rc::new(RefCell::new(Vec::new()));
        let retired = scope.resolve(
            &["x"],
            &types::FIELD,
            doc.clone(),
            SourceRange::at(5),
            &logger,
            counter_cb(hits.clone()),
            None,
        );
        assert!(!retired);
        assert_eq!(scope.pending_count(), 1);

        let target = mgr.create(&types::FIELD, "x");
        doc.adopt(&target).unwrap();
        scope.retry_all(&logger);
        assert_eq!(*hits.borrow(), vec![target.id()]);
        assert_eq!(scope.pending_count(), 0);

        scope.flush(&logger);
        assert!(!logger.has_error());
    }

    #[test]
    fn test_unresolved_reports_exactly_one_error() {
        let mgr = Manager::new();
        let logger = Logger::default();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let mut scope = ParserScope::new();
        scope.push(doc.clone());

        let hits = Rc::new(RefCell::new(Vec::new()));
        scope.resolve(
            &["missing"],
            &types::FIELD,
            doc.clone(),
            SourceRange::at(3),
            &logger,
            counter_cb(hits.clone()),
            None,
        );
        scope.flush(&logger);
        assert!(hits.borrow().is_empty());
        assert_eq!(logger.diagnostics().len(), 1);
        assert_eq!(logger.diagnostics()[0].range, Some(SourceRange::at(3)));
    }

    #[test]
    fn test_ambiguous_reference_is_an_error() {
        let mgr = Manager::new();
        let logger = Logger::default();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let a = mgr.create(&types::FIELD, "x");
        let b = mgr.create(&types::FIELD, "x");
        let inner = mgr.create(&types::NODE, "inner");
        doc.adopt(&inner).unwrap();
        inner.adopt(&a).unwrap();
        doc.adopt(&b).unwrap();

        let mut scope = ParserScope::new();
        scope.push(doc.clone());
        let hits = Rc::new(RefCell::new(Vec::new()));
        let retired = scope.resolve(
            &["x"],
            &types::FIELD,
            doc.clone(),
            SourceRange::at(0),
            &logger,
            counter_cb(hits.clone()),
            None,
        );
        assert!(retired);
        assert!(hits.borrow().is_empty());
        assert!(logger.has_error());
    }

    #[test]
    fn test_imposter_then_replacement() {
        let mgr = Manager::new();
        let logger = Logger::default();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let mut scope = ParserScope::new();
        scope.push(doc.clone());

        let hits = Rc::new(RefCell::new(Vec::new()));
        let mgr2 = mgr.clone();
        scope.resolve(
            &["x"],
            &types::FIELD,
            doc.clone(),
            SourceRange::at(0),
            &logger,
            counter_cb(hits.clone()),
            Some(Rc::new(move || mgr2.create(&types::FIELD, "x"))),
        );
        // Placeholder delivered immediately.
        assert_eq!(hits.borrow().len(), 1);
        assert_eq!(scope.pending_count(), 1);

        let real = mgr.create(&types::FIELD, "x");
        doc.adopt(&real).unwrap();
        scope.retry_all(&logger);
        assert_eq!(hits.borrow().len(), 2);
        assert_eq!(hits.borrow()[1], real.id());
        scope.flush(&logger);
        assert!(!logger.has_error());
    }

    #[test]
    fn test_leaf_frame_shadows_outer() {
        let mgr = Manager::new();
        let logger = Logger::default();
        let doc = mgr.create(&types::DOCUMENT, "doc");
        let outer = mgr.create(&types::FIELD, "x");
        doc.adopt(&outer).unwrap();
        let section = mgr.create(&types::NODE, "sec");
        doc.adopt(&section).unwrap();
        let inner = mgr.create(&types::FIELD, "x");
        section.adopt(&inner).unwrap();

        let mut scope = ParserScope::new();
        scope.push(doc.clone());
        scope.push(section.clone());

        let hits = Rc::new(RefCell::new(Vec::new()));
        scope.resolve(
            &["x"],
            &types::FIELD,
            doc.clone(),
            SourceRange::at(0),
            &logger,
            counter_cb(hits.clone()),
            None,
        );
        assert_eq!(*hits.borrow(), vec![inner.id()]);
    }
}
