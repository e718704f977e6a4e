//! The stateful parser stack
//!
//! Surface parsers reduce both syntaxes to four event kinds: `command_start`,
//! `annotation_start`/`annotation_end`, `data` and `range_end`. The stack
//! receives them, picks the [`ParserState`] matching each command against the
//! current frame, instantiates the state's handler and forwards the events.
//!
//! Recovery: a command no state accepts logs an error and opens a recovery
//! region in which everything up to the matching `range_end` is swallowed.
//! Handler failure works the same way; a handler either logs and continues,
//! or returns [`HandlerError`] to roll the frame back.
//!
//! States whose name does not match a child of the current frame directly
//! are searched for with [`deduce::deduce_path`], which finds the unique
//! permitted-parent chain consistent with the frames already on the stack.

pub mod deduce;
pub mod standard;

use crate::scope::ParserScope;
use crate::tokens::{Token, TokenId, WhitespaceMode};
use osml_core::diagnostics::{LoggableError, Logger};
use osml_core::managed::{Manager, Rooted};
use osml_core::rtti::{types, RttiSet, RttiType};
use osml_core::variant::{Variant, VariantMap};
use osml_core::source::SourceRange;
use std::fmt;
use std::rc::Rc;

/// Name of the pseudo-state at the bottom of every stack.
pub const ROOT_STATE: &str = "";
/// A state with this name (or parent) matches any command (or parent).
pub const WILDCARD_STATE: &str = "*";

/// How a handler reports failure to the stack.
#[derive(Debug)]
pub enum HandlerError {
    /// The handler already logged; abandon the frame and recover.
    Rollback,
    /// Log this error, then roll back.
    Loggable(LoggableError),
}

impl From<LoggableError> for HandlerError {
    fn from(err: LoggableError) -> Self {
        HandlerError::Loggable(err)
    }
}

pub type HandlerFactory = fn() -> Box<dyn Handler>;

/// Immutable description of one parser state.
pub struct ParserState {
    pub name: &'static str,
    /// Names of states this one may be entered from.
    pub parents: Vec<&'static str>,
    /// Node types handlers of this state are permitted to create.
    pub created_types: RttiSet,
    pub supports_annotations: bool,
    factory: HandlerFactory,
}

impl ParserState {
    pub fn build(name: &'static str, factory: HandlerFactory) -> Self {
        ParserState {
            name,
            parents: Vec::new(),
            created_types: RttiSet::new(Vec::new()),
            supports_annotations: false,
            factory,
        }
    }

    pub fn parent(mut self, parent: &'static str) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn creates(mut self, ty: &'static RttiType) -> Self {
        self.created_types.0.push(ty);
        self
    }

    pub fn annotations(mut self) -> Self {
        self.supports_annotations = true;
        self
    }

    pub fn make_handler(&self) -> Box<dyn Handler> {
        (self.factory)()
    }

    fn permits_parent(&self, parent: &str) -> bool {
        self.parents
            .iter()
            .any(|p| *p == parent || *p == WILDCARD_STATE)
    }
}

impl fmt::Debug for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParserState({})", self.name)
    }
}

/// All states known to one parsing run.
#[derive(Default)]
pub struct StateRegistry {
    states: Vec<Rc<ParserState>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        StateRegistry::default()
    }

    pub fn register(&mut self, state: ParserState) -> Rc<ParserState> {
        let state = Rc::new(state);
        self.states.push(state.clone());
        state
    }

    pub fn by_name(&self, name: &str) -> Vec<Rc<ParserState>> {
        self.states
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// States enterable from `parent`, in registration order.
    pub fn children_of(&self, parent: &str) -> Vec<Rc<ParserState>> {
        self.states
            .iter()
            .filter(|s| s.permits_parent(parent))
            .cloned()
            .collect()
    }

    pub fn wildcard(&self) -> Option<Rc<ParserState>> {
        self.states.iter().find(|s| s.name == WILDCARD_STATE).cloned()
    }
}

/// Token and whitespace operations a handler may perform on the surface
/// feeding it. The surface parser implements this against its tokenizer.
pub trait ParserCallbacks {
    fn set_whitespace_mode(&mut self, mode: WhitespaceMode);
    /// Field-scoped token registration; the id is released when the field
    /// closes.
    fn register_token(&mut self, token: &str) -> TokenId;
    fn unregister_token(&mut self, token: &str) -> bool;
    /// Policy check before registering: whether the surface can represent
    /// this token at all.
    fn supports_token(&self, token: &str) -> bool;
}

/// Callbacks for contexts with no live surface (tests, graph-only drivers).
pub struct NullCallbacks;

impl ParserCallbacks for NullCallbacks {
    fn set_whitespace_mode(&mut self, _mode: WhitespaceMode) {}
    fn register_token(&mut self, _token: &str) -> TokenId {
        crate::tokens::TOKEN_EMPTY
    }
    fn unregister_token(&mut self, _token: &str) -> bool {
        false
    }
    fn supports_token(&self, _token: &str) -> bool {
        false
    }
}

/// Everything a handler may touch while processing one event.
pub struct HandlerContext<'a> {
    pub manager: &'a Manager,
    pub logger: &'a Logger,
    pub scope: &'a mut ParserScope,
    pub callbacks: &'a mut dyn ParserCallbacks,
    pub location: SourceRange,
    data_type: &'a mut Option<&'static RttiType>,
    roots: &'a mut Vec<Rooted>,
}

impl HandlerContext<'_> {
    /// Which variant type subsequent `data` events parse as.
    pub fn set_data_type(&mut self, ty: Option<&'static RttiType>) {
        *self.data_type = ty;
    }

    pub fn set_whitespace_mode(&mut self, mode: WhitespaceMode) {
        self.callbacks.set_whitespace_mode(mode);
    }

    pub fn register_token(&mut self, token: &str) -> TokenId {
        self.callbacks.register_token(token)
    }

    pub fn unregister_token(&mut self, token: &str) -> bool {
        self.callbacks.unregister_token(token)
    }

    pub fn supports_token(&self, token: &str) -> bool {
        self.callbacks.supports_token(token)
    }

    /// Place a freshly created node: adopted under the scope leaf, or
    /// recorded as a top-level node when the scope is empty.
    pub fn attach(&mut self, node: &Rooted) {
        match self.scope.leaf().cloned() {
            Some(leaf) => {
                if let Err(err) = leaf.adopt(node) {
                    self.logger
                        .error(format!("cannot adopt node: {}", err), Some(self.location));
                }
            }
            None => self.roots.push(node.clone()),
        }
    }
}

/// Per-state event processing. Defaults cover states that treat annotations
/// as anchor nodes and ignore data.
pub trait Handler {
    /// Open the structural node for this command; the returned node is
    /// pushed onto the scope for the lifetime of the frame.
    fn on_start(
        &mut self,
        cx: &mut HandlerContext<'_>,
        name: &str,
        args: &VariantMap,
    ) -> Result<Option<Rooted>, HandlerError>;

    fn on_data(
        &mut self,
        _cx: &mut HandlerContext<'_>,
        _token: &Token,
        _value: &Variant,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_annotation_start(
        &mut self,
        cx: &mut HandlerContext<'_>,
        name: &str,
        args: &VariantMap,
    ) -> Result<(), HandlerError> {
        make_annotation_anchor(cx, name, args, "start");
        Ok(())
    }

    fn on_annotation_end(
        &mut self,
        cx: &mut HandlerContext<'_>,
        name: &str,
        args: &VariantMap,
    ) -> Result<(), HandlerError> {
        make_annotation_anchor(cx, name, args, "end");
        Ok(())
    }

    fn on_end(&mut self, _cx: &mut HandlerContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Annotation endpoints become anchor nodes, siblings in document order, so
/// overlapping ranges need no nesting.
pub fn make_annotation_anchor(
    cx: &mut HandlerContext<'_>,
    name: &str,
    args: &VariantMap,
    role: &str,
) -> Rooted {
    let node = cx.manager.create(&types::ANNOTATION, name);
    node.store_data("role", Variant::from(role.to_owned()));
    for (key, value) in args {
        node.store_data(key.clone(), value.clone());
    }
    cx.attach(&node);
    node
}

struct Frame {
    state: Rc<ParserState>,
    handler: Box<dyn Handler>,
    pushed_node: bool,
    data_type: Option<&'static RttiType>,
    start: SourceRange,
}

/// The event-driven parser core shared by both surfaces.
pub struct ParserStack {
    registry: Rc<StateRegistry>,
    manager: Manager,
    logger: Logger,
    scope: ParserScope,
    frames: Vec<Frame>,
    recovery_depth: usize,
    roots: Vec<Rooted>,
}

impl ParserStack {
    pub fn new(registry: Rc<StateRegistry>, manager: Manager, logger: Logger) -> Self {
        ParserStack {
            registry,
            manager,
            logger,
            scope: ParserScope::new(),
            frames: Vec::new(),
            recovery_depth: 0,
            roots: Vec::new(),
        }
    }

    pub fn scope_mut(&mut self) -> &mut ParserScope {
        &mut self.scope
    }

    /// Top-level nodes created so far, in creation order.
    pub fn roots(&self) -> &[Rooted] {
        &self.roots
    }

    pub fn take_roots(&mut self) -> Vec<Rooted> {
        std::mem::take(&mut self.roots)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn in_recovery(&self) -> bool {
        self.recovery_depth > 0
    }

    fn current_state_name(&self) -> &'static str {
        self.frames.last().map_or(ROOT_STATE, |f| f.state.name)
    }

    fn enter_recovery(&mut self) {
        self.recovery_depth = 1;
    }

    /// Discard the erroring frame without running its `on_end`; the frame's
    /// own `range_end` is then consumed by the recovery counter.
    fn abandon_top_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            if frame.pushed_node {
                self.scope.pop();
            }
        }
    }

    pub fn command_start(
        &mut self,
        callbacks: &mut dyn ParserCallbacks,
        name: &str,
        args: &VariantMap,
        range: SourceRange,
    ) {
        if self.logger.has_fatal_error() {
            return;
        }
        if self.recovery_depth > 0 {
            self.recovery_depth += 1;
            return;
        }
        let Some(state) = self.select_state(name, range) else {
            return;
        };
        let mut handler = state.make_handler();
        let mut data_type = None;
        let result = {
            let mut cx = HandlerContext {
                manager: &self.manager,
                logger: &self.logger,
                scope: &mut self.scope,
                callbacks,
                location: range,
                data_type: &mut data_type,
                roots: &mut self.roots,
            };
            handler.on_start(&mut cx, name, args)
        };
        match result {
            Ok(node) => {
                let pushed_node = node.is_some();
                if let Some(node) = node {
                    self.scope.push(node);
                }
                self.frames.push(Frame {
                    state,
                    handler,
                    pushed_node,
                    data_type,
                    start: range,
                });
            }
            Err(err) => {
                self.report_handler_error(err, range);
                self.enter_recovery();
            }
        }
    }

    /// Pick the state for `name` under the current frame: direct children
    /// first, then chain deduction, then the wildcard state.
    fn select_state(&mut self, name: &str, range: SourceRange) -> Option<Rc<ParserState>> {
        let current = self.current_state_name();
        let mut candidates: Vec<Rc<ParserState>> = self
            .registry
            .by_name(name)
            .into_iter()
            .filter(|s| s.permits_parent(current))
            .collect();
        if candidates.is_empty() && !self.registry.by_name(name).is_empty() {
            let signature: Vec<&str> = self.frames.iter().map(|f| f.state.name).collect();
            match deduce::deduce_path(&self.registry, &signature, name) {
                deduce::Deduction::Unique(chain) => {
                    candidates.extend(chain.last().cloned());
                }
                deduce::Deduction::Ambiguous(n) => {
                    self.logger.error(
                        format!("command \"{}\" is ambiguous here ({} possible chains)", name, n),
                        Some(range),
                    );
                    self.enter_recovery();
                    return None;
                }
                deduce::Deduction::None => {}
            }
        }
        if candidates.is_empty() {
            if let Some(wildcard) = self.registry.wildcard() {
                candidates.push(wildcard);
            }
        }
        match candidates.len() {
            0 => {
                self.logger.error(
                    format!("command \"{}\" is not allowed here", name),
                    Some(range),
                );
                self.enter_recovery();
                None
            }
            1 => candidates.pop(),
            n => {
                self.logger.error(
                    format!("command \"{}\" is ambiguous here ({} matching states)", name, n),
                    Some(range),
                );
                self.enter_recovery();
                None
            }
        }
    }

    pub fn data(&mut self, callbacks: &mut dyn ParserCallbacks, token: &Token) {
        if self.logger.has_fatal_error() || self.recovery_depth > 0 {
            return;
        }
        let data_type = self.frames.last().and_then(|f| f.data_type);
        let Some(value) = parse_data(&self.logger, data_type, token) else {
            return;
        };
        if self.frames.is_empty() {
            // Top-level text becomes its own node.
            let node = self.manager.create(&types::NODE, "");
            node.store_data("text", value);
            self.roots.push(node);
            return;
        }
        let result = {
            let frames = &mut self.frames;
            let mut data_type = None;
            let mut cx = HandlerContext {
                manager: &self.manager,
                logger: &self.logger,
                scope: &mut self.scope,
                callbacks,
                location: token.range,
                data_type: &mut data_type,
                roots: &mut self.roots,
            };
            let frame = match frames.last_mut() {
                Some(f) => f,
                None => return,
            };
            let r = frame.handler.on_data(&mut cx, token, &value);
            if let Some(ty) = data_type {
                frame.data_type = Some(ty);
            }
            r
        };
        if let Err(err) = result {
            self.report_handler_error(err, token.range);
            self.abandon_top_frame();
            self.enter_recovery();
        }
    }

    pub fn annotation_start(
        &mut self,
        callbacks: &mut dyn ParserCallbacks,
        name: &str,
        args: &VariantMap,
        range: SourceRange,
    ) {
        self.annotation(callbacks, name, args, range, true);
    }

    pub fn annotation_end(
        &mut self,
        callbacks: &mut dyn ParserCallbacks,
        name: &str,
        args: &VariantMap,
        range: SourceRange,
    ) {
        self.annotation(callbacks, name, args, range, false);
    }

    fn annotation(
        &mut self,
        callbacks: &mut dyn ParserCallbacks,
        name: &str,
        args: &VariantMap,
        range: SourceRange,
        start: bool,
    ) {
        if self.logger.has_fatal_error() || self.recovery_depth > 0 {
            return;
        }
        let mut data_type = None;
        let mut cx = HandlerContext {
            manager: &self.manager,
            logger: &self.logger,
            scope: &mut self.scope,
            callbacks,
            location: range,
            data_type: &mut data_type,
            roots: &mut self.roots,
        };
        let result = match self.frames.last_mut() {
            Some(frame) => {
                if start {
                    frame.handler.on_annotation_start(&mut cx, name, args)
                } else {
                    frame.handler.on_annotation_end(&mut cx, name, args)
                }
            }
            None => {
                // No open frame: annotations anchor at the top level.
                make_annotation_anchor(&mut cx, name, args, if start { "start" } else { "end" });
                Ok(())
            }
        };
        if let Err(err) = result {
            self.report_handler_error(err, range);
            self.abandon_top_frame();
            self.enter_recovery();
        }
    }

    pub fn range_end(&mut self, callbacks: &mut dyn ParserCallbacks, range: SourceRange) {
        if self.recovery_depth > 0 {
            self.recovery_depth -= 1;
            return;
        }
        let Some(mut frame) = self.frames.pop() else {
            self.logger
                .error("unmatched end of range", Some(range));
            return;
        };
        let mut data_type = None;
        let result = {
            let mut cx = HandlerContext {
                manager: &self.manager,
                logger: &self.logger,
                scope: &mut self.scope,
                callbacks,
                location: range,
                data_type: &mut data_type,
                roots: &mut self.roots,
            };
            frame.handler.on_end(&mut cx)
        };
        if let Err(err) = result {
            self.report_handler_error(err, range);
        }
        if frame.pushed_node {
            self.scope.pop();
        }
        // New definitions may satisfy parked references.
        self.scope.retry_all(&self.logger);
    }

    /// End of input: unclosed frames are errors; each still receives its
    /// `range_end`, then parked resolution requests are flushed.
    pub fn finalize(&mut self, callbacks: &mut dyn ParserCallbacks, range: SourceRange) {
        self.recovery_depth = 0;
        while let Some(frame) = self.frames.last() {
            self.logger.error(
                format!("\"{}\" was never closed", frame.state.name),
                Some(frame.start),
            );
            self.range_end(callbacks, range);
        }
        self.scope.flush(&self.logger);
    }

    fn report_handler_error(&self, err: HandlerError, range: SourceRange) {
        match err {
            HandlerError::Rollback => {}
            HandlerError::Loggable(mut loggable) => {
                if loggable.range.is_none() {
                    loggable.range = Some(range);
                }
                self.logger.log_error(&loggable);
            }
        }
    }
}

fn parse_data(
    logger: &Logger,
    data_type: Option<&'static RttiType>,
    token: &Token,
) -> Option<Variant> {
    use osml_core::variant::{parse_double, parse_int};
    let Some(ty) = data_type else {
        return Some(Variant::from(token.content.clone()));
    };
    if *ty == *types::INT {
        match parse_int(&token.content) {
            Some(i) => Some(Variant::Int(i)),
            None => {
                logger.error(
                    format!("\"{}\" is not an integer", token.content),
                    Some(token.range),
                );
                None
            }
        }
    } else if *ty == *types::DOUBLE {
        match parse_double(&token.content) {
            Some(d) => Some(Variant::Double(d)),
            None => {
                logger.error(
                    format!("\"{}\" is not a number", token.content),
                    Some(token.range),
                );
                None
            }
        }
    } else if *ty == *types::BOOL {
        match token.content.trim() {
            "true" => Some(Variant::Bool(true)),
            "false" => Some(Variant::Bool(false)),
            other => {
                logger.error(format!("\"{}\" is not a boolean", other), Some(token.range));
                None
            }
        }
    } else {
        Some(Variant::from(token.content.clone()))
    }
}
