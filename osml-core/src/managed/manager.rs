//! The managed object graph
//!
//! The [`Manager`] owns every node it creates and tracks directed edges
//! between them. Edges are strong or weak: strong edges keep their target
//! alive, weak edges only observe. A node stays alive while it is reachable
//! over strong edges from at least one externally-rooted handle; everything
//! else, including strong cycles, is collected by a mark-from-roots sweep.
//!
//! Collection policy
//!
//!     Whenever a decrement leaves a node without root references, the node
//!     goes on a sweep queue. The sweep runs when the queue grows past the
//!     amortization threshold or on [`Manager::sweep_now`]. The default
//!     threshold is zero (eager collection); raise it with
//!     [`Manager::with_threshold`] to batch sweeps. Destruction order within
//!     a swept component is unspecified; weak references into the component
//!     resolve to `None` afterwards.
//!
//! The manager handle is cheaply cloneable; all state lives behind a single
//! `RefCell`, so usage is single-threaded by construction.

use crate::managed::events::{Event, EventCallback, EventHandlerEntry};
use crate::managed::handles::{Rooted, WeakHandle};
use crate::managed::node::NodeData;
use crate::rtti::RttiType;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Unique, monotone node identifier within one manager.
pub type NodeId = u64;

/// Edge annotation: strong edges keep the target alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Strong,
    Weak,
}

/// Errors from graph-structural operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Adoption of a node that already has a parent.
    ParentAlreadySet { child: NodeId },
    /// Operation on a node this manager does not know (dead or foreign).
    UnknownNode { id: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::ParentAlreadySet { child } => {
                write!(f, "node {} already has a parent", child)
            }
            GraphError::UnknownNode { id } => write!(f, "unknown node {}", id),
        }
    }
}

impl std::error::Error for GraphError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EdgeTally {
    strong: usize,
    weak: usize,
}

impl EdgeTally {
    fn is_empty(&self) -> bool {
        self.strong == 0 && self.weak == 0
    }
}

#[derive(Default)]
struct ObjectInfo {
    root_refs: usize,
    in_edges: HashMap<NodeId, EdgeTally>,
    out_edges: HashMap<NodeId, EdgeTally>,
}

struct NodeEntry {
    data: Rc<RefCell<NodeData>>,
    info: ObjectInfo,
}

pub(crate) struct ManagerInner {
    nodes: HashMap<NodeId, NodeEntry>,
    next_id: NodeId,
    sweep_queue: Vec<NodeId>,
    threshold: usize,
    deleted: u64,
    sweeping: bool,
    delete_hook: Option<Rc<dyn Fn(NodeId)>>,
}

/// Shared handle to the managed graph.
#[derive(Clone)]
pub struct Manager {
    pub(crate) inner: Rc<RefCell<ManagerInner>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    /// Manager with eager collection (threshold zero).
    pub fn new() -> Self {
        Self::with_threshold(0)
    }

    /// Manager that batches sweeps until the queue exceeds `threshold`.
    pub fn with_threshold(threshold: usize) -> Self {
        Manager {
            inner: Rc::new(RefCell::new(ManagerInner {
                nodes: HashMap::new(),
                next_id: 1,
                sweep_queue: Vec::new(),
                threshold,
                deleted: 0,
                sweeping: false,
                delete_hook: None,
            })),
        }
    }

    /// Create a node and hand back a rooted handle to it.
    pub fn create(&self, rtti: &'static RttiType, name: impl Into<String>) -> Rooted {
        let (id, data) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let data = Rc::new(RefCell::new(NodeData::new(id, rtti, name.into())));
            inner.nodes.insert(
                id,
                NodeEntry {
                    data: data.clone(),
                    info: ObjectInfo {
                        root_refs: 1,
                        ..ObjectInfo::default()
                    },
                },
            );
            (id, data)
        };
        Rooted::from_parts(self.clone(), data, id)
    }

    pub fn alive(&self, id: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Total number of nodes destroyed so far.
    pub fn deleted_count(&self) -> u64 {
        self.inner.borrow().deleted
    }

    /// Callback invoked (outside any internal borrow) for every deleted node.
    pub fn set_delete_hook(&self, hook: Option<Rc<dyn Fn(NodeId)>>) {
        self.inner.borrow_mut().delete_hook = hook;
    }

    /// Rooted handle to a live node.
    pub fn rooted(&self, id: NodeId) -> Option<Rooted> {
        let data = {
            let mut inner = self.inner.borrow_mut();
            let entry = inner.nodes.get_mut(&id)?;
            entry.info.root_refs += 1;
            entry.data.clone()
        };
        Some(Rooted::from_parts(self.clone(), data, id))
    }

    /// Weak handle to a node; liveness is observed at upgrade time.
    pub fn weak(&self, id: NodeId) -> Option<WeakHandle> {
        let inner = self.inner.borrow();
        let entry = inner.nodes.get(&id)?;
        Some(WeakHandle::from_parts(
            Rc::downgrade(&self.inner),
            Rc::downgrade(&entry.data),
            id,
        ))
    }

    pub(crate) fn data(&self, id: NodeId) -> Option<Rc<RefCell<NodeData>>> {
        self.inner.borrow().nodes.get(&id).map(|e| e.data.clone())
    }

    pub(crate) fn add_root_ref(&self, id: NodeId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(entry) = inner.nodes.get_mut(&id) {
            entry.info.root_refs += 1;
        }
    }

    pub(crate) fn release_root_ref(&self, id: NodeId) {
        let sweep = {
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.nodes.get_mut(&id) {
                entry.info.root_refs = entry.info.root_refs.saturating_sub(1);
                if entry.info.root_refs == 0 {
                    inner.sweep_queue.push(id);
                }
            }
            inner.should_sweep()
        };
        if sweep {
            self.run_sweep();
        }
    }

    /// Record one edge `from -> to`.
    pub fn add_edge(&self, from: NodeId, to: NodeId, kind: EdgeKind) {
        let mut inner = self.inner.borrow_mut();
        if !inner.nodes.contains_key(&from) || !inner.nodes.contains_key(&to) {
            return;
        }
        let bump = |t: &mut EdgeTally| match kind {
            EdgeKind::Strong => t.strong += 1,
            EdgeKind::Weak => t.weak += 1,
        };
        if let Some(entry) = inner.nodes.get_mut(&from) {
            bump(entry.info.out_edges.entry(to).or_default());
        }
        if let Some(entry) = inner.nodes.get_mut(&to) {
            bump(entry.info.in_edges.entry(from).or_default());
        }
    }

    /// Remove one edge `from -> to`; removing the last strong edge into a
    /// node may queue it for collection.
    pub fn remove_edge(&self, from: NodeId, to: NodeId, kind: EdgeKind) {
        let sweep = {
            let mut inner = self.inner.borrow_mut();
            let drop_tally = |t: &mut EdgeTally| match kind {
                EdgeKind::Strong => t.strong = t.strong.saturating_sub(1),
                EdgeKind::Weak => t.weak = t.weak.saturating_sub(1),
            };
            if let Some(entry) = inner.nodes.get_mut(&from) {
                if let Some(t) = entry.info.out_edges.get_mut(&to) {
                    drop_tally(t);
                    if t.is_empty() {
                        entry.info.out_edges.remove(&to);
                    }
                }
            }
            if let Some(entry) = inner.nodes.get_mut(&to) {
                if let Some(t) = entry.info.in_edges.get_mut(&from) {
                    drop_tally(t);
                    if t.is_empty() {
                        entry.info.in_edges.remove(&from);
                    }
                }
                if kind == EdgeKind::Strong && entry.info.root_refs == 0 {
                    inner.sweep_queue.push(to);
                }
            }
            inner.should_sweep()
        };
        if sweep {
            self.run_sweep();
        }
    }

    /// Run the mark-from-roots sweep immediately.
    pub fn sweep_now(&self) {
        let run = {
            let mut inner = self.inner.borrow_mut();
            if inner.sweeping {
                false
            } else {
                inner.sweeping = true;
                true
            }
        };
        if run {
            self.sweep_loop();
        }
    }

    fn run_sweep(&self) {
        let run = {
            let mut inner = self.inner.borrow_mut();
            if inner.sweeping || !inner.should_sweep() {
                false
            } else {
                inner.sweeping = true;
                true
            }
        };
        if run {
            self.sweep_loop();
        }
    }

    /// Repeated mark-and-sweep until the queue settles. Removed entries are
    /// dropped outside the internal borrow: their payloads may hold handles
    /// whose destructors call back into the manager.
    fn sweep_loop(&self) {
        loop {
            let (removed, hook): (Vec<(NodeId, NodeEntry)>, Option<Rc<dyn Fn(NodeId)>>) = {
                let mut inner = self.inner.borrow_mut();
                inner.sweep_queue.clear();

                // Mark phase: everything strong-reachable from a rooted node.
                let mut marked: HashSet<NodeId> = HashSet::new();
                let mut stack: Vec<NodeId> = inner
                    .nodes
                    .iter()
                    .filter(|(_, e)| e.info.root_refs > 0)
                    .map(|(id, _)| *id)
                    .collect();
                while let Some(id) = stack.pop() {
                    if !marked.insert(id) {
                        continue;
                    }
                    if let Some(entry) = inner.nodes.get(&id) {
                        for (target, tally) in entry.info.out_edges.iter() {
                            if tally.strong > 0 && !marked.contains(target) {
                                stack.push(*target);
                            }
                        }
                    }
                }

                // Sweep phase.
                let dead: Vec<NodeId> = inner
                    .nodes
                    .keys()
                    .filter(|id| !marked.contains(*id))
                    .copied()
                    .collect();
                let mut removed = Vec::with_capacity(dead.len());
                for id in &dead {
                    if let Some(entry) = inner.nodes.remove(id) {
                        removed.push((*id, entry));
                    }
                }
                if !removed.is_empty() {
                    let dead_set: HashSet<NodeId> = dead.iter().copied().collect();
                    for entry in inner.nodes.values_mut() {
                        entry.info.in_edges.retain(|id, _| !dead_set.contains(id));
                        entry.info.out_edges.retain(|id, _| !dead_set.contains(id));
                        let mut data = entry.data.borrow_mut();
                        if data.parent().is_some_and(|p| dead_set.contains(&p)) {
                            data.set_parent_raw(None);
                        }
                        data.children_mut().retain(|c| !dead_set.contains(c));
                    }
                    inner.deleted += removed.len() as u64;
                }
                (removed, inner.delete_hook.clone())
            };

            if let Some(hook) = hook {
                for (id, _) in &removed {
                    hook(*id);
                }
            }
            // May re-enter the manager and queue more work.
            drop(removed);

            let mut inner = self.inner.borrow_mut();
            let queue_live = inner.sweep_queue.iter().any(|id| {
                inner
                    .nodes
                    .get(id)
                    .is_some_and(|e| e.info.root_refs == 0)
            });
            if !queue_live {
                inner.sweep_queue.clear();
                inner.sweeping = false;
                return;
            }
        }
    }

    /// Adopt `child` under `parent`: sets the parent link (exactly once),
    /// appends to the ordered child list, and records a strong edge.
    pub fn adopt(&self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        {
            let inner = self.inner.borrow();
            let parent_entry = inner
                .nodes
                .get(&parent)
                .ok_or(GraphError::UnknownNode { id: parent })?;
            let child_entry = inner
                .nodes
                .get(&child)
                .ok_or(GraphError::UnknownNode { id: child })?;
            {
                let mut child_data = child_entry.data.borrow_mut();
                if child_data.parent().is_some() {
                    return Err(GraphError::ParentAlreadySet { child });
                }
                child_data.set_parent_raw(Some(parent));
            }
            parent_entry.data.borrow_mut().children_mut().push(child);
        }
        self.add_edge(parent, child, EdgeKind::Strong);
        Ok(())
    }

    /// Detach `child` from `parent`, dropping the adoption edge.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        {
            let inner = self.inner.borrow();
            let parent_entry = inner
                .nodes
                .get(&parent)
                .ok_or(GraphError::UnknownNode { id: parent })?;
            parent_entry
                .data
                .borrow_mut()
                .children_mut()
                .retain(|c| *c != child);
            if let Some(child_entry) = inner.nodes.get(&child) {
                child_entry.data.borrow_mut().set_parent_raw(None);
            }
        }
        self.remove_edge(parent, child, EdgeKind::Strong);
        Ok(())
    }

    /// Name-indexed child lookup (first match in child order).
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let children = {
            let inner = self.inner.borrow();
            let entry = inner.nodes.get(&parent)?;
            let data = entry.data.borrow();
            data.children().to_vec()
        };
        children.into_iter().find(|c| {
            self.data(*c)
                .is_some_and(|d| d.borrow().name() == name)
        })
    }

    pub(crate) fn register_event_handler(
        &self,
        node: NodeId,
        event_type: crate::managed::EventType,
        callback: EventCallback,
        owner: Option<NodeId>,
        include_bubbled: bool,
    ) -> Option<u64> {
        let data = self.data(node)?;
        let mut data = data.borrow_mut();
        let id = data.next_handler_id;
        data.next_handler_id += 1;
        data.handlers.push(EventHandlerEntry {
            id,
            event_type,
            callback,
            owner,
            include_bubbled,
        });
        Some(id)
    }

    pub(crate) fn unregister_event_handler(&self, node: NodeId, handler: u64) -> bool {
        let Some(data) = self.data(node) else {
            return false;
        };
        let mut data = data.borrow_mut();
        let before = data.handlers.len();
        data.handlers.retain(|h| h.id != handler);
        data.handlers.len() != before
    }

    /// Dispatch an event starting at `node`, walking parents while it
    /// bubbles. Returns true iff any handler fired.
    pub fn trigger_event(&self, node: NodeId, mut event: Event) -> bool {
        let mut fired = false;
        let mut current = node;
        let mut direct = true;
        loop {
            let (callbacks, parent) = {
                let Some(data) = self.data(current) else {
                    return fired;
                };
                let data = data.borrow();
                let callbacks: Vec<EventCallback> = data
                    .handlers
                    .iter()
                    .filter(|h| h.event_type == event.event_type && (direct || h.include_bubbled))
                    .map(|h| h.callback.clone())
                    .collect();
                (callbacks, data.parent())
            };
            for cb in callbacks {
                cb(&mut event);
                fired = true;
            }
            if !event.bubble || event.is_stopped() {
                return fired;
            }
            match parent {
                Some(p) => {
                    current = p;
                    direct = false;
                }
                None => return fired,
            }
        }
    }

    /// Name-path resolution (see `Node::resolve` in the component design):
    /// depth-first traversal over children, matching `path` starting at any
    /// visited node whose name equals the path head, and filtering leaf
    /// matches by `filter`. A visited set makes this safe on cyclic graphs.
    pub fn resolve(&self, start: NodeId, path: &[&str], filter: &RttiType) -> Vec<NodeId> {
        if path.is_empty() {
            return Vec::new();
        }
        let mut results = Vec::new();
        let mut result_set = HashSet::new();
        let mut visited = HashSet::new();
        self.resolve_visit(start, path, filter, &mut visited, &mut results, &mut result_set);
        results
    }

    fn resolve_visit(
        &self,
        id: NodeId,
        path: &[&str],
        filter: &RttiType,
        visited: &mut HashSet<NodeId>,
        results: &mut Vec<NodeId>,
        result_set: &mut HashSet<NodeId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let Some(data) = self.data(id) else {
            return;
        };
        let (name_matches, children) = {
            let data = data.borrow();
            (data.name() == path[0], data.children().to_vec())
        };
        if name_matches {
            self.resolve_tail(id, &path[1..], filter, results, result_set);
        }
        for child in children {
            self.resolve_visit(child, path, filter, visited, results, result_set);
        }
    }

    fn resolve_tail(
        &self,
        id: NodeId,
        rest: &[&str],
        filter: &RttiType,
        results: &mut Vec<NodeId>,
        result_set: &mut HashSet<NodeId>,
    ) {
        if rest.is_empty() {
            let Some(data) = self.data(id) else {
                return;
            };
            if data.borrow().rtti().isa(filter) && result_set.insert(id) {
                results.push(id);
            }
            return;
        }
        let children = {
            let Some(data) = self.data(id) else {
                return;
            };
            let data = data.borrow();
            data.children().to_vec()
        };
        for child in children {
            let matches = self
                .data(child)
                .is_some_and(|d| d.borrow().name() == rest[0]);
            if matches {
                self.resolve_tail(child, &rest[1..], filter, results, result_set);
            }
        }
    }
}

impl ManagerInner {
    fn should_sweep(&self) -> bool {
        !self.sweeping && self.sweep_queue.len() > self.threshold
    }
}
