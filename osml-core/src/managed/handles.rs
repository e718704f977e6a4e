//! Handles into the managed graph
//!
//! Three ways to refer to a node:
//!
//! * [`Rooted`]: an external root reference. The node (and everything it
//!   strongly reaches) stays alive while at least one `Rooted` exists.
//! * [`Owned`]: a strong edge held on behalf of an owner node, for
//!   cross-links that are not parent/child adoption. Dropping it removes
//!   the edge; [`Owned::reassign`] moves it to a new owner atomically.
//! * [`WeakHandle`]: observes without keeping alive; upgrade to find out
//!   whether the node still exists.

use crate::managed::events::{Event, EventCallback, EventType};
use crate::managed::manager::{EdgeKind, GraphError, Manager, ManagerInner, NodeId};
use crate::managed::node::NodeData;
use crate::rtti::RttiType;
use crate::variant::Variant;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

/// A root reference: keeps the node alive and pins it against collection.
pub struct Rooted {
    mgr: Manager,
    data: Rc<RefCell<NodeData>>,
    id: NodeId,
}

impl Rooted {
    pub(crate) fn from_parts(mgr: Manager, data: Rc<RefCell<NodeData>>, id: NodeId) -> Self {
        Rooted { mgr, data, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn manager(&self) -> &Manager {
        &self.mgr
    }

    pub fn borrow(&self) -> Ref<'_, NodeData> {
        self.data.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, NodeData> {
        self.data.borrow_mut()
    }

    pub fn name(&self) -> String {
        self.data.borrow().name().to_owned()
    }

    pub fn rtti(&self) -> &'static RttiType {
        self.data.borrow().rtti()
    }

    /// Rename the node and announce it with a bubbling `NameChange` event
    /// carrying the old name.
    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        let old = {
            let mut data = self.data.borrow_mut();
            let old = data.name().to_owned();
            data.set_name_raw(name);
            old
        };
        self.mgr.trigger_event(
            self.id,
            Event::new(EventType::NameChange, self.id)
                .bubbling()
                .with_data(Variant::from(old)),
        );
    }

    pub fn parent(&self) -> Option<Rooted> {
        let parent = self.data.borrow().parent()?;
        self.mgr.rooted(parent)
    }

    pub fn children(&self) -> Vec<NodeId> {
        self.data.borrow().children().to_vec()
    }

    /// Adopt `child` as the last child; triggers `AddChild` on self.
    pub fn adopt(&self, child: &Rooted) -> Result<(), GraphError> {
        self.mgr.adopt(self.id, child.id)?;
        self.mgr.trigger_event(
            self.id,
            Event::new(EventType::AddChild, self.id).with_data(Variant::Int(child.id as i64)),
        );
        Ok(())
    }

    /// Detach a child; triggers `RemoveChild` on self.
    pub fn remove_child(&self, child: NodeId) -> Result<(), GraphError> {
        self.mgr.remove_child(self.id, child)?;
        self.mgr.trigger_event(
            self.id,
            Event::new(EventType::RemoveChild, self.id).with_data(Variant::Int(child as i64)),
        );
        Ok(())
    }

    pub fn child_by_name(&self, name: &str) -> Option<Rooted> {
        let id = self.mgr.child_by_name(self.id, name)?;
        self.mgr.rooted(id)
    }

    pub fn store_data(&self, key: impl Into<String>, value: Variant) {
        self.data.borrow_mut().store_data(key, value);
    }

    pub fn read_data(&self, key: &str) -> Option<Variant> {
        self.data.borrow().read_data(key).cloned()
    }

    /// Name-path resolution starting at this node.
    pub fn resolve(&self, path: &[&str], filter: &'static RttiType) -> Vec<Rooted> {
        self.mgr
            .resolve(self.id, path, filter)
            .into_iter()
            .filter_map(|id| self.mgr.rooted(id))
            .collect()
    }

    /// Register an event handler on this node; the returned id unregisters.
    pub fn on(&self, event_type: EventType, include_bubbled: bool, callback: EventCallback) -> u64 {
        self.mgr
            .register_event_handler(self.id, event_type, callback, Some(self.id), include_bubbled)
            .unwrap_or(0)
    }

    pub fn off(&self, handler: u64) -> bool {
        self.mgr.unregister_event_handler(self.id, handler)
    }

    pub fn trigger(&self, event: Event) -> bool {
        self.mgr.trigger_event(self.id, event)
    }

    /// Record a strong cross-link edge from `owner` to this node.
    pub fn acquire(&self, owner: &Rooted) -> Owned {
        self.mgr.add_edge(owner.id, self.id, EdgeKind::Strong);
        Owned {
            mgr: self.mgr.clone(),
            owner: owner.id,
            target: self.id,
        }
    }

    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            mgr: Rc::downgrade(&self.mgr.inner),
            data: Rc::downgrade(&self.data),
            id: self.id,
        }
    }
}

impl Clone for Rooted {
    fn clone(&self) -> Self {
        self.mgr.add_root_ref(self.id);
        Rooted {
            mgr: self.mgr.clone(),
            data: self.data.clone(),
            id: self.id,
        }
    }
}

impl Drop for Rooted {
    fn drop(&mut self) {
        self.mgr.release_root_ref(self.id);
    }
}

impl fmt::Debug for Rooted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("Rooted")
            .field("id", &self.id)
            .field("name", &data.name())
            .field("type", &data.rtti().name())
            .finish()
    }
}

impl PartialEq for Rooted {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.mgr.inner, &other.mgr.inner)
    }
}

impl Eq for Rooted {}

/// A strong edge held for an owner node. Dropping it removes the edge,
/// which may make the target collectable.
pub struct Owned {
    mgr: Manager,
    owner: NodeId,
    target: NodeId,
}

impl Owned {
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Move the edge to a new owner. The new edge is added before the old
    /// one is removed, so the target cannot become unreachable in between.
    pub fn reassign(&mut self, new_owner: NodeId) {
        if new_owner == self.owner {
            return;
        }
        self.mgr.add_edge(new_owner, self.target, EdgeKind::Strong);
        self.mgr
            .remove_edge(self.owner, self.target, EdgeKind::Strong);
        self.owner = new_owner;
    }
}

impl Drop for Owned {
    fn drop(&mut self) {
        self.mgr
            .remove_edge(self.owner, self.target, EdgeKind::Strong);
    }
}

impl fmt::Debug for Owned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("owner", &self.owner)
            .field("target", &self.target)
            .finish()
    }
}

/// Observes a node without keeping it alive.
#[derive(Clone)]
pub struct WeakHandle {
    mgr: Weak<RefCell<ManagerInner>>,
    data: Weak<RefCell<NodeData>>,
    id: NodeId,
}

impl WeakHandle {
    pub(crate) fn from_parts(
        mgr: Weak<RefCell<ManagerInner>>,
        data: Weak<RefCell<NodeData>>,
        id: NodeId,
    ) -> Self {
        WeakHandle { mgr, data, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// True while the node has not been collected.
    pub fn is_alive(&self) -> bool {
        let Some(inner) = self.mgr.upgrade() else {
            return false;
        };
        let alive = Manager { inner }.alive(self.id);
        alive && self.data.strong_count() > 0
    }

    /// Re-root the node if it is still alive.
    pub fn upgrade(&self) -> Option<Rooted> {
        let inner = self.mgr.upgrade()?;
        let mgr = Manager { inner };
        mgr.rooted(self.id)
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for WeakHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.mgr, &other.mgr)
    }
}

impl Eq for WeakHandle {}
