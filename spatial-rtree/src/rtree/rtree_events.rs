use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;

use super::rtree_node::Node;

/// Physical node operations a listener can observe.
///
/// # Purpose
///
/// `NodeEvents` names the three storage round-trips the tree performs on a
/// node. Every event fires *after* the operation succeeded, so a listener
/// always sees the node as it now exists in (or was just removed from)
/// storage.
///
/// # Variants
///
/// - **Read**: A node was loaded from the storage manager
/// - **Write**: A node was stored; on first write it now carries its assigned identifier
/// - **Delete**: A node's page was freed
///
/// # Usage
///
/// ```ignore
/// tree.subscribe(NodeEvents::Write, NodeEventListener::new(|event, node| {
///     println!("{:?} node {}", event, node.identifier());
/// }));
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum NodeEvents {
    Read,
    Write,
    Delete,
}

pub trait NodeEventCallback: Send + Sync + Fn(NodeEvents, &Node) {}

impl<F> NodeEventCallback for F where F: Send + Sync + Fn(NodeEvents, &Node) {}

/// A cloneable handle around a node event callback.
///
/// # Characteristics
///
/// - **Cheap Cloning**: the callback is shared behind an `Arc`
/// - **Thread-Safe**: callbacks must be `Send + Sync`
/// - **Scoped**: registered on one tree instance, dropped with it
#[derive(Clone)]
pub struct NodeEventListener {
    on_event: Arc<dyn NodeEventCallback>,
}

impl NodeEventListener {
    pub fn new(on_event: impl NodeEventCallback + 'static) -> Self {
        NodeEventListener {
            on_event: Arc::new(on_event),
        }
    }

    pub(crate) fn notify(&self, event: NodeEvents, node: &Node) {
        (self.on_event)(event, node)
    }
}

impl Debug for NodeEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEventListener").finish()
    }
}

/// Listener lists of one tree, one list per event.
#[derive(Default)]
pub(crate) struct NodeListeners {
    read: RwLock<Vec<NodeEventListener>>,
    write: RwLock<Vec<NodeEventListener>>,
    delete: RwLock<Vec<NodeEventListener>>,
}

impl NodeListeners {
    fn list(&self, event: NodeEvents) -> &RwLock<Vec<NodeEventListener>> {
        match event {
            NodeEvents::Read => &self.read,
            NodeEvents::Write => &self.write,
            NodeEvents::Delete => &self.delete,
        }
    }

    pub fn subscribe(&self, event: NodeEvents, listener: NodeEventListener) {
        self.list(event).write().push(listener);
    }

    pub fn notify(&self, event: NodeEvents, node: &Node) {
        // Snapshot so a callback may subscribe without deadlocking.
        let listeners = self.list(event).read().clone();
        for listener in &listeners {
            listener.notify(event, node);
        }
    }
}
