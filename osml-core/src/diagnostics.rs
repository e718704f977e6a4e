//! Severity-tagged diagnostics with speculative logging
//!
//! All user-visible errors in the engine flow through [`Logger`]. A logger is
//! a cheaply cloneable handle; every component holds its own clone and logs
//! into the shared diagnostic list.
//!
//! Forking
//!
//!     `fork()` produces a shadow logger that buffers its diagnostics.
//!     `commit()` replays them into the parent in order; `abandon()` discards
//!     them. Surface parsers use this for speculative parses that may be
//!     rolled back.
//!
//! Source context
//!
//!     The logger never touches byte buffers. The owner of the source text
//!     installs a context-resolver callback; rendering a diagnostic asks the
//!     callback to turn a [`SourceRange`] into a [`SourceContext`].

use crate::source::context::floor_char_boundary;
use crate::source::{SourceContext, SourceRange};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// Diagnostic severity, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Note,
    Warning,
    Error,
    FatalError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "debug",
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::FatalError => "fatal error",
        };
        write!(f, "{}", name)
    }
}

/// A single logged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub range: Option<SourceRange>,
}

/// An error that carries its own source location and converts into a logged
/// `Error` diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggableError {
    pub message: String,
    pub range: Option<SourceRange>,
}

impl LoggableError {
    pub fn new(message: impl Into<String>) -> Self {
        LoggableError {
            message: message.into(),
            range: None,
        }
    }

    pub fn at(message: impl Into<String>, range: SourceRange) -> Self {
        LoggableError {
            message: message.into(),
            range: Some(range),
        }
    }
}

impl fmt::Display for LoggableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LoggableError {}

type ContextResolver = Rc<dyn Fn(SourceRange) -> Option<SourceContext>>;

struct LoggerInner {
    diagnostics: Vec<Diagnostic>,
    max_severity: Option<Severity>,
    resolver: Option<ContextResolver>,
}

/// Shared diagnostic sink. Cloning yields another handle to the same sink.
#[derive(Clone)]
pub struct Logger {
    inner: Rc<RefCell<LoggerInner>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        Logger {
            inner: Rc::new(RefCell::new(LoggerInner {
                diagnostics: Vec::new(),
                max_severity: None,
                resolver: None,
            })),
        }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>, range: Option<SourceRange>) {
        let mut inner = self.inner.borrow_mut();
        inner.max_severity = Some(match inner.max_severity {
            Some(max) => max.max(severity),
            None => severity,
        });
        inner.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            range,
        });
    }

    pub fn debug(&self, message: impl Into<String>, range: Option<SourceRange>) {
        self.log(Severity::Debug, message, range);
    }

    pub fn note(&self, message: impl Into<String>, range: Option<SourceRange>) {
        self.log(Severity::Note, message, range);
    }

    pub fn warning(&self, message: impl Into<String>, range: Option<SourceRange>) {
        self.log(Severity::Warning, message, range);
    }

    pub fn error(&self, message: impl Into<String>, range: Option<SourceRange>) {
        self.log(Severity::Error, message, range);
    }

    pub fn fatal_error(&self, message: impl Into<String>, range: Option<SourceRange>) {
        self.log(Severity::FatalError, message, range);
    }

    /// Log a [`LoggableError`] at `Error` severity.
    pub fn log_error(&self, err: &LoggableError) {
        self.log(Severity::Error, err.message.clone(), err.range);
    }

    /// True once anything at `Error` or above has been logged.
    pub fn has_error(&self) -> bool {
        self.inner
            .borrow()
            .max_severity
            .is_some_and(|s| s >= Severity::Error)
    }

    pub fn has_fatal_error(&self) -> bool {
        self.inner
            .borrow()
            .max_severity
            .is_some_and(|s| s >= Severity::FatalError)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.inner.borrow().max_severity
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.borrow().diagnostics.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().diagnostics.is_empty()
    }

    /// Install the callback that resolves ranges to source context.
    pub fn set_context_resolver(&self, resolver: Option<ContextResolver>) {
        self.inner.borrow_mut().resolver = resolver;
    }

    pub fn resolve_context(&self, range: SourceRange) -> Option<SourceContext> {
        let resolver = self.inner.borrow().resolver.clone();
        resolver.and_then(|r| r(range))
    }

    /// Start a speculative logging session.
    pub fn fork(&self) -> LoggerFork {
        let child = Logger::new();
        child.set_context_resolver(self.inner.borrow().resolver.clone());
        LoggerFork {
            parent: self.clone(),
            child,
        }
    }

    /// Render one diagnostic with its source context, if resolvable.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = format!("{}: {}", diagnostic.severity, diagnostic.message);
        if let Some(range) = diagnostic.range {
            if let Some(ctx) = self.resolve_context(range) {
                out.push_str(&format!("\n  --> {}\n", ctx.start));
                for line in ctx.text.lines() {
                    out.push_str(&format!("   | {}\n", line));
                }
                if !ctx.text.contains('\n') {
                    // Offsets from the resolver may sit inside a code point.
                    let caret = floor_char_boundary(&ctx.text, ctx.relative_offset);
                    let caret_end = floor_char_boundary(
                        &ctx.text,
                        ctx.relative_offset.saturating_add(ctx.relative_length),
                    );
                    let pad = ctx.text[..caret].chars().count();
                    let width = ctx.text[caret..caret_end].chars().count().max(1);
                    out.push_str(&format!(
                        "   | {}{}\n",
                        " ".repeat(pad),
                        "^".repeat(width)
                    ));
                }
            } else {
                out.push_str(&format!(" (at bytes {})", range));
            }
        }
        out
    }
}

/// A buffered logger shadow produced by [`Logger::fork`].
pub struct LoggerFork {
    parent: Logger,
    child: Logger,
}

impl LoggerFork {
    /// Replay all buffered diagnostics into the parent, in order.
    pub fn commit(self) {
        let diagnostics = {
            let mut inner = self.child.inner.borrow_mut();
            std::mem::take(&mut inner.diagnostics)
        };
        for d in diagnostics {
            self.parent.log(d.severity, d.message, d.range);
        }
    }

    /// Discard all buffered diagnostics.
    pub fn abandon(self) {}
}

impl Deref for LoggerFork {
    type Target = Logger;

    fn deref(&self) -> &Logger {
        &self.child
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Debug < Severity::Note);
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::FatalError);
    }

    #[test]
    fn test_error_flag_is_sticky() {
        let log = Logger::new();
        assert!(!log.has_error());
        log.warning("w", None);
        assert!(!log.has_error());
        log.error("e", None);
        assert!(log.has_error());
        log.note("n", None);
        assert!(log.has_error());
    }

    #[test]
    fn test_clones_share_state() {
        let log = Logger::new();
        let other = log.clone();
        other.error("shared", None);
        assert!(log.has_error());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_fork_commit_replays_in_order() {
        let log = Logger::new();
        log.note("before", None);
        let fork = log.fork();
        fork.error("forked 1", None);
        fork.warning("forked 2", None);
        assert_eq!(log.len(), 1);
        assert!(!log.has_error());
        fork.commit();
        let msgs: Vec<String> = log.diagnostics().into_iter().map(|d| d.message).collect();
        assert_eq!(msgs, vec!["before", "forked 1", "forked 2"]);
        assert!(log.has_error());
    }

    #[test]
    fn test_fork_abandon_discards() {
        let log = Logger::new();
        let fork = log.fork();
        fork.error("dropped", None);
        fork.abandon();
        assert!(log.is_empty());
        assert!(!log.has_error());
    }

    #[test]
    fn test_loggable_error_logs_at_error() {
        let log = Logger::new();
        let err = LoggableError::at("bad token", SourceRange::new(3, 5));
        log.log_error(&err);
        let diags = log.diagnostics();
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].range, Some(SourceRange::new(3, 5)));
    }

    #[test]
    fn test_render_without_resolver() {
        let log = Logger::new();
        log.error("oops", Some(SourceRange::new(1, 4)));
        let rendered = log.render(&log.diagnostics()[0]);
        assert!(rendered.starts_with("error: oops"));
        assert!(rendered.contains("1..4"));
    }

    #[test]
    fn test_render_tolerates_unaligned_context_offsets() {
        use crate::source::SourcePosition;

        let log = Logger::new();
        log.set_context_resolver(Some(Rc::new(|_range| {
            // relative_offset 3 sits inside the two-byte 'ï'.
            Some(SourceContext {
                text: "naïve".to_string(),
                relative_offset: 3,
                relative_length: 1,
                start: SourcePosition::new(1, 3),
                end: SourcePosition::new(1, 4),
                truncated_start: false,
                truncated_end: false,
            })
        })));
        log.error("bad", Some(SourceRange::new(2, 4)));
        let rendered = log.render(&log.diagnostics()[0]);
        assert!(rendered.contains("naïve"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn test_render_with_resolver() {
        use crate::source::SourceContextReader;

        let source = "hello broken world".to_string();
        let log = Logger::new();
        let src = source.clone();
        log.set_context_resolver(Some(Rc::new(move |range| {
            Some(SourceContextReader::new(&src).context(range, 80))
        })));
        log.error("bad word", Some(SourceRange::new(6, 12)));
        let rendered = log.render(&log.diagnostics()[0]);
        assert!(rendered.contains("hello broken world"));
        assert!(rendered.contains("^^^^^^"));
    }
}
