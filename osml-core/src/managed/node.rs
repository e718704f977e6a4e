//! Node payload: name, parent, children, typed data, event handlers.
//!
//! `NodeData` is the per-node record owned by the
//! [`Manager`](crate::managed::Manager) arena. External code reaches it
//! through handles; graph-structural operations (adoption, edges, events,
//! resolution) live on the manager and the handles because they need to see
//! more than one node at a time.

use crate::managed::events::EventHandlerEntry;
use crate::managed::NodeId;
use crate::rtti::RttiType;
use crate::variant::Variant;
use std::collections::BTreeMap;

pub struct NodeData {
    id: NodeId,
    rtti: &'static RttiType,
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: BTreeMap<String, Variant>,
    pub(crate) handlers: Vec<EventHandlerEntry>,
    pub(crate) next_handler_id: u64,
}

impl NodeData {
    pub(crate) fn new(id: NodeId, rtti: &'static RttiType, name: String) -> Self {
        NodeData {
            id,
            rtti,
            name,
            parent: None,
            children: Vec::new(),
            data: BTreeMap::new(),
            handlers: Vec::new(),
            next_handler_id: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn rtti(&self) -> &'static RttiType {
        self.rtti
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name_raw(&mut self, name: String) {
        self.name = name;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// A node is a root iff it has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn set_parent_raw(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    /// Store a value in the typed-data side channel.
    ///
    /// The side channel never contains nulls: storing `Variant::Null`
    /// removes the key instead.
    pub fn store_data(&mut self, key: impl Into<String>, value: Variant) {
        let key = key.into();
        if value.is_null() {
            self.data.remove(&key);
        } else {
            self.data.insert(key, value);
        }
    }

    pub fn read_data(&self, key: &str) -> Option<&Variant> {
        self.data.get(key)
    }

    pub fn has_data_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn data(&self) -> &BTreeMap<String, Variant> {
        &self.data
    }
}
