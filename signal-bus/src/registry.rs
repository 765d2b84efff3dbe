//! Signal registry
//!
//! An in-process mapping from signal name to an ordered list of
//! (action, context) subscriptions. The registry is fully decoupled from the
//! document tree: the binding engine is just one of its callers. Methods
//! take `&self` so that an action may re-enter the registry (add/remove/
//! raise) while a raise is in flight - the subscription list is snapshotted
//! before invocation begins, so mid-raise changes only affect later raises.
//!
//! The registry is an explicit instance constructed by the host and shared
//! via `Rc` - there is no ambient global table.

use crate::types::{ActionFault, ActionResult, Result, SignalBusError, Value};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// The callable shape of a subscribed action.
///
/// The first parameter is the subscription's bound context, the second is
/// the raise argument list (event payload first, declarative extra
/// arguments after it).
pub type ActionFn = dyn Fn(&Rc<dyn Any>, &[Value]) -> ActionResult;

/// A reference-counted action handle.
///
/// Identity for duplicate detection and removal is the `Rc` allocation
/// itself (`Rc::ptr_eq`), never structural comparison.
pub type Action = Rc<ActionFn>;

/// One (action, context) pair registered under a signal name
#[derive(Clone)]
struct Subscription {
    /// The callback to invoke on raise
    action: Action,
    /// Opaque invocation context handed to the action on every raise
    context: Rc<dyn Any>,
}

/// Aggregated outcome of a single raise
#[derive(Debug, Default)]
pub struct RaiseOutcome {
    /// Number of actions that completed without fault
    pub invoked: usize,
    /// Faults by subscription position in the snapshotted invocation order
    pub faults: Vec<(usize, ActionFault)>,
}

impl RaiseOutcome {
    /// Total number of actions that were invoked, faulting or not
    pub fn attempted(&self) -> usize {
        self.invoked + self.faults.len()
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of signal names with at least one live subscription
    pub num_signals: usize,
    /// Total number of live subscriptions
    pub num_subscriptions: usize,
}

/// The signal registry - the sole public surface consumed by application code
pub struct SignalRegistry {
    /// Subscriptions by signal name, insertion order preserved.
    /// Emptied entries may linger; they are equivalent to absence.
    signals: RefCell<HashMap<String, Vec<Subscription>>>,
}

impl SignalRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            signals: RefCell::new(HashMap::new()),
        }
    }

    /// Subscribe `action` under `name`, using the action itself as context.
    ///
    /// Returns `Ok(false)` without side effect if the same action (by
    /// reference) is already subscribed under `name`.
    ///
    /// # Example
    /// ```
    /// use signal_bus::{Action, SignalRegistry};
    /// use std::rc::Rc;
    ///
    /// let registry = SignalRegistry::new();
    /// let action: Action = Rc::new(|_ctx, _args| Ok(()));
    ///
    /// assert!(registry.add("save", Rc::clone(&action)).unwrap());
    /// assert!(!registry.add("save", action).unwrap()); // duplicate
    /// ```
    pub fn add(&self, name: &str, action: Action) -> Result<bool> {
        // An unbound action still gets a defined invocation context: itself.
        let context: Rc<dyn Any> = Rc::new(Rc::clone(&action));
        self.add_with_context(name, action, context)
    }

    /// Subscribe `action` under `name` with an explicit invocation context
    pub fn add_with_context(
        &self,
        name: &str,
        action: Action,
        context: Rc<dyn Any>,
    ) -> Result<bool> {
        validate_name(name)?;

        let mut signals = self.signals.borrow_mut();
        let subs = signals.entry(name.to_string()).or_default();
        if subs.iter().any(|s| Rc::ptr_eq(&s.action, &action)) {
            log::debug!("Signal {:?}: action already subscribed, ignoring", name);
            return Ok(false);
        }
        subs.push(Subscription { action, context });
        Ok(true)
    }

    /// Unsubscribe the first subscription whose action matches by reference.
    ///
    /// Returns `Ok(true)` if a subscription was removed, `Ok(false)` if the
    /// action was not subscribed under `name`.
    pub fn remove(&self, name: &str, action: &Action) -> Result<bool> {
        validate_name(name)?;

        let mut signals = self.signals.borrow_mut();
        let Some(subs) = signals.get_mut(name) else {
            return Ok(false);
        };
        match subs.iter().position(|s| Rc::ptr_eq(&s.action, action)) {
            Some(idx) => {
                subs.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Raise `name`, invoking every current subscription in insertion order.
    ///
    /// The subscription list is snapshotted before the first invocation, so
    /// actions adding or removing subscriptions under the same name do not
    /// affect the current raise. A faulting action is logged and skipped;
    /// it never aborts the remaining actions or propagates to the caller.
    ///
    /// Returns the number of actions that completed without fault. Raising
    /// an unknown name is not an error and returns 0.
    pub fn raise(&self, name: &str, args: &[Value]) -> Result<usize> {
        Ok(self.raise_detailed(name, args)?.invoked)
    }

    /// Like [`raise`](Self::raise) but reporting per-subscription faults
    pub fn raise_detailed(&self, name: &str, args: &[Value]) -> Result<RaiseOutcome> {
        validate_name(name)?;

        // Snapshot, then drop the borrow before invoking anything.
        let snapshot: Vec<Subscription> = match self.signals.borrow().get(name) {
            Some(subs) => subs.clone(),
            None => return Ok(RaiseOutcome::default()),
        };

        log::trace!(
            "Raising signal {:?} for {} subscription(s)",
            name,
            snapshot.len()
        );

        let mut outcome = RaiseOutcome::default();
        for (idx, sub) in snapshot.iter().enumerate() {
            match (sub.action)(&sub.context, args) {
                Ok(()) => outcome.invoked += 1,
                Err(fault) => {
                    log::warn!(
                        "Signal {:?}: action #{} faulted: {}",
                        name,
                        idx,
                        fault
                    );
                    outcome.faults.push((idx, fault));
                }
            }
        }
        Ok(outcome)
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let signals = self.signals.borrow();
        let num_signals = signals.values().filter(|subs| !subs.is_empty()).count();
        let num_subscriptions = signals.values().map(|subs| subs.len()).sum();
        RegistryStats {
            num_signals,
            num_subscriptions,
        }
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A signal name must be non-empty after trimming
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(SignalBusError::InvalidSignalName(name.to_string()))
    } else {
        Ok(())
    }
}
