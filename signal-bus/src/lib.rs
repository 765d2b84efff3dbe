//! Signal Bus Library
//!
//! A minimal publish/subscribe signal bus bound to a live document tree.
//! Application code registers named signals with callback actions; markup
//! elements declare, via attributes, which signal to raise and on which
//! native events; the binding engine keeps the attribute-to-listener
//! bindings synchronized as elements are added, removed, or edited at
//! runtime.
//!
//! # Architecture
//!
//! Two components, dependency order leaves-first:
//! - [`SignalRegistry`] - name -> ordered (action, context) subscription
//!   list, with add/remove/raise. Fully decoupled from the tree.
//! - [`BindingEngine`] - consumes tree-mutation records and an initial
//!   full-tree scan, derives a [`BindingDescriptor`] per element, installs
//!   and removes native listeners, and routes fired events into the
//!   registry.
//!
//! The library does NOT:
//! - Guarantee delivery ordering across independent signal names
//! - Persist subscriptions or transport signals anywhere
//! - Namespace signals beyond flat string names
//!
//! # Example Usage
//!
//! ```
//! use signal_bus::{BindingEngine, Document, EngineConfig, SignalRegistry};
//! use std::rc::Rc;
//!
//! let document = Rc::new(Document::new());
//! let registry = Rc::new(SignalRegistry::new());
//!
//! // <button data-signal="save" data-signal-events="click"
//! //         data-signal-args='[1, "ok"]'/>
//! let button = document.create_element("button");
//! document.set_attribute(button, "data-signal", "save").unwrap();
//! document.set_attribute(button, "data-signal-events", "click").unwrap();
//! document.set_attribute(button, "data-signal-args", r#"[1, "ok"]"#).unwrap();
//! document.append_child(document.root(), button).unwrap();
//!
//! registry
//!     .add("save", Rc::new(|_ctx, args| {
//!         // args[0] is the event payload, args[1..] the declarative extras
//!         println!("save raised with {} argument(s)", args.len());
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! let mut engine = BindingEngine::new(
//!     Rc::clone(&document),
//!     Rc::clone(&registry),
//!     EngineConfig::default(),
//! );
//! engine.init().unwrap();
//!
//! // Simulate a native click
//! let fired = document.dispatch(button, "click", &serde_json::json!({"type": "click"}));
//! assert_eq!(fired, 1);
//! ```

// Public modules
pub mod config;
pub mod descriptor;
pub mod document;
pub mod engine;
pub mod registry;
pub mod types;

// Re-export main types for convenience
pub use config::{EngineConfig, DEFAULT_SUPPORTED_EVENTS};
pub use descriptor::{
    BindingDescriptor, DescriptorError, ATTR_ARGS, ATTR_EVENTS, ATTR_SIGNAL,
};
pub use document::{Document, ElementId, ListenerFn, ListenerHandle, MutationRecord};
pub use engine::{BindingEngine, EngineStats};
pub use registry::{Action, ActionFn, RaiseOutcome, RegistryStats, SignalRegistry};
pub use types::{ActionFault, ActionResult, Result, SignalBusError, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
