//! Managed, cycle-tolerant object graph
//!
//! Nodes live in a [`Manager`] arena and refer to each other through strong
//! and weak edges. External code holds [`Rooted`] handles; anything not
//! strong-reachable from a root is collected, strong cycles included.

mod events;
mod handles;
mod manager;
mod node;

pub use events::{Event, EventCallback, EventType};
pub use handles::{Owned, Rooted, WeakHandle};
pub use manager::{EdgeKind, GraphError, Manager, NodeId};
pub use node::NodeData;
