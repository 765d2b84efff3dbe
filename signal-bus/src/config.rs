//! Engine configuration types
//!
//! The only tunable surface of the binding engine is the event-type
//! allow-list: the enumerated set of native event names a declarative
//! descriptor may subscribe to. Membership is a plain lookup - there is no
//! runtime probing of element capabilities.

use serde::{Deserialize, Serialize};

/// Default event surface: the common mouse/keyboard/focus/form events
pub const DEFAULT_SUPPORTED_EVENTS: &[&str] = &[
    "click",
    "dblclick",
    "mousedown",
    "mouseup",
    "mouseover",
    "mouseout",
    "mousemove",
    "keydown",
    "keyup",
    "keypress",
    "focus",
    "blur",
    "change",
    "input",
    "submit",
];

/// Configuration for the binding engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Event-type names a descriptor may bind to. Tokens outside this list
    /// are rejected during descriptor parsing.
    #[serde(default = "default_supported_events")]
    pub supported_events: Vec<String>,
}

fn default_supported_events() -> Vec<String> {
    DEFAULT_SUPPORTED_EVENTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supported_events: default_supported_events(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with the default event surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: replace the supported event list
    pub fn with_supported_events(mut self, events: Vec<String>) -> Self {
        self.supported_events = events;
        self
    }

    /// Builder method: add one event type to the supported list
    pub fn add_supported_event(mut self, event: impl Into<String>) -> Self {
        self.supported_events.push(event.into());
        self
    }

    /// Check whether an event type is on the allow-list
    pub fn supports_event(&self, event: &str) -> bool {
        self.supported_events.iter().any(|e| e == event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_surface() {
        let config = EngineConfig::new();
        assert!(config.supports_event("click"));
        assert!(config.supports_event("keydown"));
        assert!(!config.supports_event("teleport"));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_supported_events(vec!["resize".to_string()])
            .add_supported_event("scroll");

        assert!(config.supports_event("resize"));
        assert!(config.supports_event("scroll"));
        assert!(!config.supports_event("click"));
    }

    #[test]
    fn test_deserialization_with_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert!(config.supports_event("click"));

        let config: EngineConfig =
            serde_json::from_str(r#"{"supported_events": ["tap"]}"#).unwrap();
        assert!(config.supports_event("tap"));
        assert!(!config.supports_event("click"));
    }
}
