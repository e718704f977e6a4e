//! Node events
//!
//! Events are delivered to handlers registered on a node and, if the event
//! bubbles, to handlers registered on its ancestors (innermost first). A
//! handler registered with `include_bubbled` also receives events bubbling up
//! from descendants; otherwise it only sees events triggered directly on its
//! node.

use crate::managed::NodeId;
use crate::variant::Variant;
use std::rc::Rc;

/// Event kinds. `Custom` keeps the enumeration open for transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Update,
    NameChange,
    AddChild,
    RemoveChild,
    Custom(&'static str),
}

/// An event in flight.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    /// The node the event was triggered on.
    pub sender: NodeId,
    pub data: Variant,
    pub bubble: bool,
    stopped: bool,
}

impl Event {
    pub fn new(event_type: EventType, sender: NodeId) -> Self {
        Event {
            event_type,
            sender,
            data: Variant::Null,
            bubble: false,
            stopped: false,
        }
    }

    pub fn bubbling(mut self) -> Self {
        self.bubble = true;
        self
    }

    pub fn with_data(mut self, data: Variant) -> Self {
        self.data = data;
        self
    }

    /// Prevent the event from reaching any further ancestors.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

pub type EventCallback = Rc<dyn Fn(&mut Event)>;

pub(crate) struct EventHandlerEntry {
    pub id: u64,
    pub event_type: EventType,
    pub callback: EventCallback,
    /// Handler owner; kept for bookkeeping and debugging, not consulted
    /// during dispatch.
    #[allow(dead_code)]
    pub owner: Option<NodeId>,
    pub include_bubbled: bool,
}
