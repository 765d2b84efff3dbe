//! Binding engine
//!
//! Consumes tree-mutation records and an initial full-tree scan; for each
//! element carrying the declarative attributes it derives a descriptor and
//! installs or uninstalls native listeners accordingly, routing fired
//! events into the signal registry.
//!
//! Lifecycle invariants:
//! - an element has at most one binding at any time; installing always
//!   tears the previous binding down first (full replace, never partial)
//! - all listener handles of a binding are removed together
//! - teardown is idempotent
//! - no parse failure, install failure or dispatch fault stops the engine
//!   from observing further mutations

use crate::config::EngineConfig;
use crate::descriptor::{self, BindingDescriptor};
use crate::document::{Document, ElementId, ListenerFn, ListenerHandle, MutationRecord};
use crate::registry::SignalRegistry;
use crate::types::{Result, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

/// The live translation of one element's declarative attributes
struct Binding {
    descriptor: BindingDescriptor,
    /// Handles of every native listener this binding installed
    listeners: Vec<ListenerHandle>,
}

/// Engine statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of elements with a live binding
    pub num_bindings: usize,
    /// Total number of native listeners installed by those bindings
    pub num_listeners: usize,
}

/// The binding engine - keeps declarative element state and native
/// listeners consistent under arbitrary tree mutations
pub struct BindingEngine {
    document: Rc<Document>,
    registry: Rc<SignalRegistry>,
    config: EngineConfig,
    /// Element -> binding table, shared with the dispatcher closure
    bindings: Rc<RefCell<HashMap<ElementId, Binding>>>,
    /// The one shared native listener installed for every accepted event
    dispatcher: Rc<ListenerFn>,
    /// Mutation feed, present once `init` has run
    mutations: Option<Receiver<MutationRecord>>,
    /// Host lifecycle hook, fired once after the initial scan
    ready_hook: Option<Box<dyn FnOnce()>>,
}

impl BindingEngine {
    /// Create a new engine over `document`, raising into `registry`
    pub fn new(
        document: Rc<Document>,
        registry: Rc<SignalRegistry>,
        config: EngineConfig,
    ) -> Self {
        let bindings: Rc<RefCell<HashMap<ElementId, Binding>>> =
            Rc::new(RefCell::new(HashMap::new()));

        // The single shared dispatch function. It recovers the firing
        // element's binding at fire time; a missing binding means the
        // teardown raced a just-fired event, which is a silent no-op.
        let dispatcher: Rc<ListenerFn> = {
            let bindings = Rc::clone(&bindings);
            let registry = Rc::clone(&registry);
            Rc::new(move |element, event, payload: &Value| {
                let (signal, args) = match bindings.borrow().get(&element) {
                    Some(binding) => {
                        let mut args = Vec::with_capacity(binding.descriptor.args.len() + 1);
                        args.push(payload.clone());
                        args.extend(binding.descriptor.args.iter().cloned());
                        (binding.descriptor.signal.clone(), args)
                    }
                    None => {
                        log::trace!(
                            "Event {:?} fired on {:?} with no binding, ignoring",
                            event,
                            element
                        );
                        return;
                    }
                };
                log::debug!(
                    "Event {:?} on {:?} raising signal {:?}",
                    event,
                    element,
                    signal
                );
                if let Err(e) = registry.raise(&signal, &args) {
                    log::warn!("Raise of {:?} failed: {}", signal, e);
                }
            })
        };

        Self {
            document,
            registry,
            config,
            bindings,
            dispatcher,
            mutations: None,
            ready_hook: None,
        }
    }

    /// Register the host lifecycle hook, invoked exactly once after the
    /// initial full-tree scan. Its absence is not an error.
    pub fn on_ready(&mut self, hook: impl FnOnce() + 'static) {
        self.ready_hook = Some(Box::new(hook));
    }

    /// Run the initial full-tree scan, begin observing mutations, then fire
    /// the ready hook.
    ///
    /// # Example
    /// ```
    /// use signal_bus::{BindingEngine, Document, EngineConfig, SignalRegistry};
    /// use std::rc::Rc;
    ///
    /// let document = Rc::new(Document::new());
    /// let registry = Rc::new(SignalRegistry::new());
    /// let mut engine = BindingEngine::new(
    ///     Rc::clone(&document),
    ///     Rc::clone(&registry),
    ///     EngineConfig::default(),
    /// );
    /// engine.init().unwrap();
    /// assert_eq!(engine.stats().num_bindings, 0);
    /// ```
    pub fn init(&mut self) -> Result<()> {
        let root = self.document.root();
        for element in self.document.descendants(root) {
            self.bind_element(element);
        }
        self.mutations = Some(self.document.observe());

        let stats = self.stats();
        log::info!(
            "Initial scan complete: {} binding(s), {} listener(s)",
            stats.num_bindings,
            stats.num_listeners
        );

        if let Some(hook) = self.ready_hook.take() {
            hook();
        }
        Ok(())
    }

    /// Drain the currently queued mutation records as one batch and process
    /// them in delivery order. Returns the number of records processed.
    pub fn pump(&mut self) -> usize {
        let Some(rx) = self.mutations.as_ref() else {
            return 0;
        };
        let mut batch = Vec::new();
        while let Ok(record) = rx.try_recv() {
            batch.push(record);
        }
        if batch.is_empty() {
            return 0;
        }

        log::trace!("Processing mutation batch of {} record(s)", batch.len());
        let count = batch.len();
        for record in batch {
            self.process_record(record);
        }
        count
    }

    /// Process one tree-change record.
    ///
    /// Public so a host with its own mutation feed can push records
    /// directly instead of going through [`pump`](Self::pump).
    pub fn process_record(&self, record: MutationRecord) {
        match record {
            MutationRecord::AttributeChanged { element, attribute } => {
                // Unrelated attribute churn never touches bindings
                if !descriptor::is_descriptor_attribute(&attribute) {
                    return;
                }
                // Stale record for an element that has since left the tree
                if !self.document.contains(element) {
                    return;
                }
                self.bind_element(element);
            }
            MutationRecord::Added { root } => {
                for element in self.document.descendants(root) {
                    if self.document.contains(element) {
                        self.bind_element(element);
                    }
                }
            }
            MutationRecord::Removed { root } => {
                for element in self.document.descendants(root) {
                    self.unbind_element(element);
                }
                // Mutations inside a disconnected subtree emit no records,
                // so elements detached from it before this record was
                // processed are no longer reachable from `root`. Sweep any
                // binding whose element has left the tree.
                let stale: Vec<ElementId> = self
                    .bindings
                    .borrow()
                    .keys()
                    .copied()
                    .filter(|element| !self.document.contains(*element))
                    .collect();
                for element in stale {
                    self.unbind_element(element);
                }
            }
        }
    }

    /// The registry this engine raises into
    pub fn registry(&self) -> &Rc<SignalRegistry> {
        &self.registry
    }

    /// True if the element currently has a live binding
    pub fn has_binding(&self, element: ElementId) -> bool {
        self.bindings.borrow().contains_key(&element)
    }

    /// The signal name the element is currently bound to, if any
    pub fn bound_signal(&self, element: ElementId) -> Option<String> {
        self.bindings
            .borrow()
            .get(&element)
            .map(|b| b.descriptor.signal.clone())
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStats {
        let bindings = self.bindings.borrow();
        EngineStats {
            num_bindings: bindings.len(),
            num_listeners: bindings.values().map(|b| b.listeners.len()).sum(),
        }
    }

    /// Re-evaluate one element: tear down any existing binding, then parse
    /// its current attributes and install listeners on success. A parse
    /// failure leaves the element unbound.
    fn bind_element(&self, element: ElementId) {
        self.unbind_element(element);

        let signal = self.document.attribute(element, descriptor::ATTR_SIGNAL);
        let events = self.document.attribute(element, descriptor::ATTR_EVENTS);
        let args = self.document.attribute(element, descriptor::ATTR_ARGS);

        let parsed = descriptor::parse(
            signal.as_deref(),
            events.as_deref(),
            args.as_deref(),
            &self.config,
        );
        let descriptor = match parsed {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return,
            Err(e) => {
                log::warn!(
                    "Element {:?}: descriptor rejected, leaving unbound: {}",
                    element,
                    e
                );
                return;
            }
        };

        let mut handles = Vec::with_capacity(descriptor.events.len());
        for event in &descriptor.events {
            match self
                .document
                .add_listener(element, event.as_str(), Rc::clone(&self.dispatcher))
            {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Partial install is not a valid state: roll back
                    log::warn!(
                        "Element {:?}: listener install for {:?} failed ({}), unbinding",
                        element,
                        event,
                        e
                    );
                    for handle in handles.drain(..) {
                        self.document.remove_listener(handle);
                    }
                    return;
                }
            }
        }

        log::debug!(
            "Element {:?} bound to signal {:?} on events {:?}",
            element,
            descriptor.signal,
            descriptor.events
        );
        self.bindings.borrow_mut().insert(
            element,
            Binding {
                descriptor,
                listeners: handles,
            },
        );
    }

    /// Tear down the element's binding, removing every listener it
    /// installed. A no-op for elements with no binding.
    fn unbind_element(&self, element: ElementId) {
        let Some(binding) = self.bindings.borrow_mut().remove(&element) else {
            return;
        };
        for handle in binding.listeners {
            self.document.remove_listener(handle);
        }
        log::debug!(
            "Element {:?} unbound from signal {:?}",
            element,
            binding.descriptor.signal
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ATTR_ARGS, ATTR_EVENTS, ATTR_SIGNAL};
    use crate::registry::Action;
    use serde_json::json;

    struct Harness {
        document: Rc<Document>,
        registry: Rc<SignalRegistry>,
        engine: BindingEngine,
    }

    fn harness() -> Harness {
        let document = Rc::new(Document::new());
        let registry = Rc::new(SignalRegistry::new());
        let engine = BindingEngine::new(
            Rc::clone(&document),
            Rc::clone(&registry),
            EngineConfig::default(),
        );
        Harness {
            document,
            registry,
            engine,
        }
    }

    /// Action collecting every argument list it is invoked with
    fn recorder() -> (Action, Rc<RefCell<Vec<Vec<Value>>>>) {
        let seen: Rc<RefCell<Vec<Vec<Value>>>> = Rc::new(RefCell::new(Vec::new()));
        let action: Action = {
            let seen = Rc::clone(&seen);
            Rc::new(move |_ctx, args| {
                seen.borrow_mut().push(args.to_vec());
                Ok(())
            })
        };
        (action, seen)
    }

    #[test]
    fn test_initial_scan_binds_existing_elements() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();

        h.engine.init().unwrap();
        assert!(h.engine.has_binding(button));
        assert_eq!(h.engine.bound_signal(button).as_deref(), Some("save"));
        assert_eq!(h.engine.stats().num_listeners, 1);
    }

    #[test]
    fn test_ready_hook_fires_once_after_scan() {
        let mut h = harness();
        let fired = Rc::new(RefCell::new(0u32));
        {
            let fired = Rc::clone(&fired);
            h.engine.on_ready(move || *fired.borrow_mut() += 1);
        }

        h.engine.init().unwrap();
        assert_eq!(*fired.borrow(), 1);

        // A second init does not re-fire the hook
        h.engine.init().unwrap();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_added_subtree_binds_descendants() {
        let mut h = harness();
        h.engine.init().unwrap();

        let panel = h.document.create_element("div");
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(panel, button).unwrap();
        h.document.append_child(h.document.root(), panel).unwrap();

        assert_eq!(h.engine.pump(), 1);
        assert!(h.engine.has_binding(button));
        assert!(!h.engine.has_binding(panel));
    }

    #[test]
    fn test_removed_subtree_unbinds_descendants() {
        let mut h = harness();
        let panel = h.document.create_element("div");
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(panel, button).unwrap();
        h.document.append_child(h.document.root(), panel).unwrap();
        h.engine.init().unwrap();
        assert!(h.engine.has_binding(button));

        h.document.remove(panel).unwrap();
        h.engine.pump();
        assert!(!h.engine.has_binding(button));
        assert_eq!(h.document.listener_count(), 0);
    }

    #[test]
    fn test_detach_within_removed_subtree_still_unbinds() {
        let mut h = harness();
        let panel = h.document.create_element("div");
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(panel, button).unwrap();
        h.document.append_child(h.document.root(), panel).unwrap();
        h.engine.init().unwrap();
        assert!(h.engine.has_binding(button));

        // Remove the panel, then detach the button from the already
        // disconnected panel before the record is pumped. The second
        // removal emits nothing.
        h.document.remove(panel).unwrap();
        h.document.remove(button).unwrap();
        h.engine.pump();

        assert!(!h.engine.has_binding(button));
        assert_eq!(h.document.listener_count(), 0);
    }

    #[test]
    fn test_dispatch_routes_payload_and_extra_args() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document
            .set_attribute(button, ATTR_ARGS, r#"[1, "ok"]"#)
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();
        h.engine.init().unwrap();

        let (action, seen) = recorder();
        h.registry.add("save", action).unwrap();

        let payload = json!({"type": "click", "x": 3});
        h.document.dispatch(button, "click", &payload);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![payload.clone(), json!(1), json!("ok")]);
    }

    #[test]
    fn test_descriptor_parse_failure_leaves_element_unbound() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document
            .set_attribute(button, ATTR_ARGS, "[not json")
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();

        h.engine.init().unwrap();
        assert!(!h.engine.has_binding(button));
        assert_eq!(h.document.listener_count(), 0);
    }

    #[test]
    fn test_invalid_descriptor_edit_tears_down_not_replaces() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();
        h.engine.init().unwrap();
        assert!(h.engine.has_binding(button));

        // Clearing the signal name invalidates the whole descriptor
        h.document.set_attribute(button, ATTR_SIGNAL, "").unwrap();
        h.engine.pump();
        assert!(!h.engine.has_binding(button));
        assert_eq!(h.document.listener_count(), 0);
    }

    #[test]
    fn test_unrelated_attribute_churn_ignored() {
        let mut h = harness();
        let div = h.document.create_element("div");
        h.document.append_child(h.document.root(), div).unwrap();
        h.engine.init().unwrap();

        h.document.set_attribute(div, "class", "highlight").unwrap();
        h.document.set_attribute(div, "id", "main").unwrap();
        assert_eq!(h.engine.pump(), 2);
        assert!(!h.engine.has_binding(div));
    }

    #[test]
    fn test_multiple_events_share_one_binding() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click, keydown, mouseover")
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();
        h.engine.init().unwrap();

        let stats = h.engine.stats();
        assert_eq!(stats.num_bindings, 1);
        assert_eq!(stats.num_listeners, 3);

        let (action, seen) = recorder();
        h.registry.add("save", action).unwrap();
        h.document.dispatch(button, "click", &json!(null));
        h.document.dispatch(button, "keydown", &json!(null));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_full_replace_on_descriptor_edit() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();
        h.engine.init().unwrap();

        h.document
            .set_attribute(button, ATTR_SIGNAL, "discard")
            .unwrap();
        h.engine.pump();

        assert_eq!(h.engine.bound_signal(button).as_deref(), Some("discard"));
        // The replace never stacks listeners
        assert_eq!(h.document.listener_count(), 1);
    }

    #[test]
    fn test_stale_records_are_noops() {
        let mut h = harness();
        let button = h.document.create_element("button");
        h.document.set_attribute(button, ATTR_SIGNAL, "save").unwrap();
        h.document
            .set_attribute(button, ATTR_EVENTS, "click")
            .unwrap();
        h.document.append_child(h.document.root(), button).unwrap();
        h.engine.init().unwrap();

        // Attribute edit and removal land in the same batch: the attribute
        // record is stale by the time it is processed
        h.document
            .set_attribute(button, ATTR_EVENTS, "keydown")
            .unwrap();
        h.document.remove(button).unwrap();
        h.engine.pump();

        assert!(!h.engine.has_binding(button));
        assert_eq!(h.document.listener_count(), 0);
    }

    #[test]
    fn test_pump_before_init_is_noop() {
        let mut h = harness();
        assert_eq!(h.engine.pump(), 0);
    }
}
