//! Core types for the signal bus library
//!
//! This module defines the error types and the argument value carrier shared
//! by the registry and the binding engine. The bus is value-agnostic: raise
//! arguments and event payloads travel as `serde_json::Value` and are passed
//! through to actions unmodified.

use std::fmt;

/// Argument and event-payload carrier used throughout the bus.
///
/// Declarative extra arguments are JSON literals, so `serde_json::Value` is
/// the natural common type. Event payloads are opaque to the engine - it
/// never inspects them, it only forwards them to subscribed actions.
pub type Value = serde_json::Value;

/// Result type for signal bus operations
pub type Result<T> = std::result::Result<T, SignalBusError>;

/// Errors surfaced synchronously to callers of the public API
#[derive(Debug, thiserror::Error)]
pub enum SignalBusError {
    /// A signal name was empty or all-whitespace
    #[error("Invalid signal name: {0:?}")]
    InvalidSignalName(String),

    /// An element handle does not refer to any element in the document
    #[error("Element not found: {0:?}")]
    ElementNotFound(crate::document::ElementId),

    /// A tree mutation would produce an invalid tree (cycle, detached root, ...)
    #[error("Invalid tree operation: {0}")]
    InvalidTreeOperation(String),
}

/// A fault produced by a single action invocation during a raise.
///
/// Faults are reported per subscription and never propagate out of `raise` -
/// the remaining subscriptions still run. Actions signal failure by
/// returning `Err(ActionFault)` instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFault {
    /// Human-readable description of the failure
    pub message: String,
}

impl ActionFault {
    /// Create a new fault with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActionFault {}

/// Result type returned by every action invocation
pub type ActionResult = std::result::Result<(), ActionFault>;
