//! In-memory document tree
//!
//! A minimal live element tree for the binding engine to observe: elements
//! with string attributes, a native-listener table, and a mutation channel.
//! This is the collaborator surface the engine consumes - a host embedding
//! the engine in a real markup runtime replaces this module's role, feeding
//! the same `MutationRecord`s and listener calls from its own tree.
//!
//! The tree is an arena: `ElementId` handles index into node storage and
//! never dangle. Removing an element detaches its subtree from the root but
//! keeps the nodes alive, so stale notifications and late event dispatches
//! on removed elements degrade to no-ops instead of panics.

use crate::types::{Result, SignalBusError, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

/// Handle to an element in the document arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

/// Handle to an installed native listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

/// The callable shape of a native listener.
///
/// Invoked with the firing element, the event type, and the opaque payload.
pub type ListenerFn = dyn Fn(ElementId, &str, &Value);

/// One batched tree-change record delivered to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// An attribute on a connected element was set or removed
    AttributeChanged {
        element: ElementId,
        attribute: String,
    },
    /// A subtree rooted at `root` became connected to the document
    Added { root: ElementId },
    /// A subtree rooted at `root` was disconnected from the document
    Removed { root: ElementId },
}

/// One element's storage
struct Node {
    tag: String,
    attributes: HashMap<String, String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// A registered native listener
struct ListenerEntry {
    element: ElementId,
    event: String,
    listener: Rc<ListenerFn>,
}

/// Listener table - handles increase monotonically, so iteration over the
/// `BTreeMap` visits listeners in registration order.
struct ListenerTable {
    next_handle: u64,
    entries: BTreeMap<u64, ListenerEntry>,
}

/// The live document tree.
///
/// All fields use interior mutability so a `Document` can be shared as
/// `Rc<Document>` between the host and the binding engine. Single-threaded
/// by design; dispatch snapshots the matching listeners before invoking
/// them, so listeners may mutate the document re-entrantly.
pub struct Document {
    nodes: RefCell<Vec<Node>>,
    listeners: RefCell<ListenerTable>,
    observer: RefCell<Option<Sender<MutationRecord>>>,
}

impl Document {
    /// Create a new document containing only the root element
    pub fn new() -> Self {
        let root = Node {
            tag: "root".to_string(),
            attributes: HashMap::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: RefCell::new(vec![root]),
            listeners: RefCell::new(ListenerTable {
                next_handle: 0,
                entries: BTreeMap::new(),
            }),
            observer: RefCell::new(None),
        }
    }

    /// The root element - always present, never removable
    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Create a new detached element with the given tag name.
    ///
    /// The element is not part of the tree until appended under a connected
    /// parent; no mutation record is emitted for creation.
    pub fn create_element(&self, tag: impl Into<String>) -> ElementId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node {
            tag: tag.into(),
            attributes: HashMap::new(),
            parent: None,
            children: Vec::new(),
        });
        ElementId(nodes.len() - 1)
    }

    /// Append `child` (and its subtree) under `parent`.
    ///
    /// Emits an `Added` record for the subtree root if the parent is
    /// connected to the document.
    pub fn append_child(&self, parent: ElementId, child: ElementId) -> Result<()> {
        {
            let mut nodes = self.nodes.borrow_mut();
            if parent.0 >= nodes.len() {
                return Err(SignalBusError::ElementNotFound(parent));
            }
            if child.0 >= nodes.len() {
                return Err(SignalBusError::ElementNotFound(child));
            }
            if child == self.root() {
                return Err(SignalBusError::InvalidTreeOperation(
                    "cannot reparent the root element".to_string(),
                ));
            }
            if nodes[child.0].parent.is_some() {
                return Err(SignalBusError::InvalidTreeOperation(format!(
                    "element {:?} already has a parent",
                    child
                )));
            }
            // Reject cycles: the parent must not live inside the child's subtree
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == child {
                    return Err(SignalBusError::InvalidTreeOperation(format!(
                        "appending {:?} under {:?} would create a cycle",
                        child, parent
                    )));
                }
                cursor = nodes[current.0].parent;
            }

            nodes[child.0].parent = Some(parent);
            nodes[parent.0].children.push(child);
        }

        if self.contains(child) {
            self.emit(MutationRecord::Added { root: child });
        }
        Ok(())
    }

    /// Detach `element` (and its subtree) from its parent.
    ///
    /// The nodes stay in the arena; the handle stays valid but the subtree
    /// is no longer reachable from the root. Emits a `Removed` record if the
    /// element was connected.
    pub fn remove(&self, element: ElementId) -> Result<()> {
        if element == self.root() {
            return Err(SignalBusError::InvalidTreeOperation(
                "cannot remove the root element".to_string(),
            ));
        }
        let was_connected = self.contains(element);
        {
            let mut nodes = self.nodes.borrow_mut();
            if element.0 >= nodes.len() {
                return Err(SignalBusError::ElementNotFound(element));
            }
            let Some(parent) = nodes[element.0].parent.take() else {
                // Already detached - removal is idempotent
                return Ok(());
            };
            nodes[parent.0].children.retain(|c| *c != element);
        }

        if was_connected {
            self.emit(MutationRecord::Removed { root: element });
        }
        Ok(())
    }

    /// Set an attribute value, emitting an `AttributeChanged` record if the
    /// element is connected
    pub fn set_attribute(
        &self,
        element: ElementId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        {
            let mut nodes = self.nodes.borrow_mut();
            if element.0 >= nodes.len() {
                return Err(SignalBusError::ElementNotFound(element));
            }
            nodes[element.0].attributes.insert(name.clone(), value.into());
        }
        if self.contains(element) {
            self.emit(MutationRecord::AttributeChanged {
                element,
                attribute: name,
            });
        }
        Ok(())
    }

    /// Remove an attribute, emitting an `AttributeChanged` record if the
    /// element is connected and the attribute existed
    pub fn remove_attribute(&self, element: ElementId, name: &str) -> Result<()> {
        let existed = {
            let mut nodes = self.nodes.borrow_mut();
            if element.0 >= nodes.len() {
                return Err(SignalBusError::ElementNotFound(element));
            }
            nodes[element.0].attributes.remove(name).is_some()
        };
        if existed && self.contains(element) {
            self.emit(MutationRecord::AttributeChanged {
                element,
                attribute: name.to_string(),
            });
        }
        Ok(())
    }

    /// Get an attribute value
    pub fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(element.0)
            .and_then(|node| node.attributes.get(name).cloned())
    }

    /// Get an element's tag name
    pub fn tag(&self, element: ElementId) -> Option<String> {
        self.nodes.borrow().get(element.0).map(|n| n.tag.clone())
    }

    /// True if the element is reachable from the document root
    pub fn contains(&self, element: ElementId) -> bool {
        let nodes = self.nodes.borrow();
        if element.0 >= nodes.len() {
            return false;
        }
        let mut cursor = element;
        loop {
            if cursor == self.root() {
                return true;
            }
            match nodes[cursor.0].parent {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    /// Preorder snapshot of the subtree rooted at `element`, root included.
    ///
    /// Returns an empty list for an unknown handle.
    pub fn descendants(&self, element: ElementId) -> Vec<ElementId> {
        let nodes = self.nodes.borrow();
        if element.0 >= nodes.len() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![element];
        while let Some(current) = stack.pop() {
            out.push(current);
            // Reverse so preorder visits children left to right
            stack.extend(nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    /// Start observing tree mutations.
    ///
    /// Every subsequent connected-tree mutation emits one record on the
    /// returned channel. Only one observer is active at a time; observing
    /// again replaces the previous channel, and a dropped receiver silently
    /// stops emission.
    pub fn observe(&self) -> Receiver<MutationRecord> {
        let (tx, rx) = mpsc::channel();
        *self.observer.borrow_mut() = Some(tx);
        rx
    }

    fn emit(&self, record: MutationRecord) {
        let mut observer = self.observer.borrow_mut();
        if let Some(tx) = observer.as_ref() {
            if tx.send(record).is_err() {
                *observer = None;
            }
        }
    }

    /// Install a native listener for `event` on `element`
    pub fn add_listener(
        &self,
        element: ElementId,
        event: impl Into<String>,
        listener: Rc<ListenerFn>,
    ) -> Result<ListenerHandle> {
        if element.0 >= self.nodes.borrow().len() {
            return Err(SignalBusError::ElementNotFound(element));
        }
        let mut table = self.listeners.borrow_mut();
        let handle = ListenerHandle(table.next_handle);
        table.next_handle += 1;
        table.entries.insert(
            handle.0,
            ListenerEntry {
                element,
                event: event.into(),
                listener,
            },
        );
        Ok(handle)
    }

    /// Remove a native listener. Idempotent: returns `false` if the handle
    /// was already removed.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        self.listeners.borrow_mut().entries.remove(&handle.0).is_some()
    }

    /// Number of currently installed listeners (all elements)
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    /// Deliver a native event to `element`.
    ///
    /// Invokes every listener registered for this (element, event) pair, in
    /// registration order, and returns how many ran. The matching listeners
    /// are snapshotted first so they may mutate the document or the listener
    /// table while running. An element with no matching listener - including
    /// a detached one - is a no-op.
    pub fn dispatch(&self, element: ElementId, event: &str, payload: &Value) -> usize {
        let matching: Vec<Rc<ListenerFn>> = self
            .listeners
            .borrow()
            .entries
            .values()
            .filter(|entry| entry.element == element && entry.event == event)
            .map(|entry| Rc::clone(&entry.listener))
            .collect();

        log::trace!(
            "Dispatching {:?} on {:?} to {} listener(s)",
            event,
            element,
            matching.len()
        );
        for listener in &matching {
            listener(element, event, payload);
        }
        matching.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
