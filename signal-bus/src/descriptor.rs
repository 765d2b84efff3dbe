//! Declarative descriptor parsing
//!
//! Translates an element's declarative attributes into a
//! [`BindingDescriptor`] or a parse failure. The wire format is three
//! separate attributes; the names are fixed constants and part of the
//! stable contract between markup and engine:
//!
//! - `data-signal` - the signal name to raise (required, non-empty)
//! - `data-signal-events` - comma-separated native event types (required)
//! - `data-signal-args` - optional JSON array literal of extra arguments
//!
//! Parse failures are never fatal: callers report them and treat the
//! element as unbound.

use crate::config::EngineConfig;
use crate::types::Value;

/// Attribute naming the signal to raise
pub const ATTR_SIGNAL: &str = "data-signal";
/// Attribute listing the native event types to bind
pub const ATTR_EVENTS: &str = "data-signal-events";
/// Attribute carrying the extra-argument JSON array literal
pub const ATTR_ARGS: &str = "data-signal-args";

/// True if `name` is one of the three descriptor attributes.
///
/// The engine uses this to ignore unrelated attribute churn (`class`,
/// `id`, ...) in mutation batches.
pub fn is_descriptor_attribute(name: &str) -> bool {
    matches!(name, ATTR_SIGNAL | ATTR_EVENTS | ATTR_ARGS)
}

/// The parsed declarative state of one element
#[derive(Debug, Clone, PartialEq)]
pub struct BindingDescriptor {
    /// Signal name to raise, trimmed, non-empty
    pub signal: String,
    /// Accepted event types, trimmed, deduplicated, attribute order preserved
    pub events: Vec<String>,
    /// Extra arguments appended after the event payload on every raise
    pub args: Vec<Value>,
}

/// Why an element's declarative attributes could not form a descriptor
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DescriptorError {
    /// `data-signal` missing or empty while other descriptor attributes exist
    #[error("missing or empty {} attribute", ATTR_SIGNAL)]
    MissingSignalName,

    /// `data-signal-events` missing or empty
    #[error("missing or empty {} attribute", ATTR_EVENTS)]
    MissingEventList,

    /// Every event token was rejected by the allow-list
    #[error("no supported event types (rejected: {0:?})")]
    NoSupportedEvents(Vec<String>),

    /// `data-signal-args` was not a valid JSON array literal
    #[error("malformed argument literal {0:?}: {1}")]
    BadArgumentList(String, String),
}

/// Parse an element's declarative attribute values.
///
/// Returns `Ok(None)` when no descriptor attribute is present at all - the
/// element is simply unbound, nothing to report. Returns an error when the
/// attributes are present but do not form a valid descriptor. Individual
/// unsupported event tokens are logged and dropped; only an empty accepted
/// set fails the whole descriptor.
pub fn parse(
    signal_attr: Option<&str>,
    events_attr: Option<&str>,
    args_attr: Option<&str>,
    config: &EngineConfig,
) -> Result<Option<BindingDescriptor>, DescriptorError> {
    if signal_attr.is_none() && events_attr.is_none() && args_attr.is_none() {
        return Ok(None);
    }

    let signal = signal_attr
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DescriptorError::MissingSignalName)?
        .to_string();

    let events_attr = events_attr
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DescriptorError::MissingEventList)?;

    let mut events: Vec<String> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();
    for token in events_attr.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !config.supports_event(token) {
            log::warn!(
                "Signal {:?}: unsupported event type {:?}, dropping token",
                signal,
                token
            );
            rejected.push(token.to_string());
            continue;
        }
        if !events.iter().any(|e| e == token) {
            events.push(token.to_string());
        }
    }
    if events.is_empty() {
        return Err(DescriptorError::NoSupportedEvents(rejected));
    }

    let args = match args_attr.map(str::trim).filter(|s| !s.is_empty()) {
        Some(literal) => serde_json::from_str::<Vec<Value>>(literal).map_err(|e| {
            DescriptorError::BadArgumentList(literal.to_string(), e.to_string())
        })?,
        None => Vec::new(),
    };

    Ok(Some(BindingDescriptor {
        signal,
        events,
        args,
    }))
}
