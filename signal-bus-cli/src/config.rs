//! Scenario loading and parsing
//!
//! A scenario TOML file describes a document tree, the signal names to
//! subscribe reporters to, and a script of steps (tree mutations and
//! simulated native events) to replay against the engine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A complete scenario (loaded from a .toml file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    /// Signal names to attach a reporting subscriber to
    #[serde(default)]
    pub signals: Vec<String>,

    /// Initial document tree, parents before children
    #[serde(default)]
    pub elements: Vec<ElementConfig>,

    /// Steps replayed in order after the initial scan
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One element of the initial tree
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElementConfig {
    /// Scenario-local name used to reference the element in steps
    pub name: String,
    /// Tag name
    pub tag: String,
    /// Parent element name; defaults to the document root
    pub parent: Option<String>,
    /// Initial attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// One scripted step
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum StepConfig {
    /// Simulate a native event on an element
    Dispatch {
        element: String,
        event: String,
        /// Optional JSON literal for the event payload
        payload: Option<String>,
    },
    /// Set an attribute value
    SetAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    /// Remove an attribute
    RemoveAttribute { element: String, attribute: String },
    /// Create a new element and attach it
    AddElement { element: ElementConfig },
    /// Detach an element (and its subtree) from the tree
    RemoveElement { element: String },
}

/// Load a scenario from a TOML file
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {:?}", path))?;

    let scenario: Scenario = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file: {:?}", path))?;

    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_deserialization() {
        let toml_content = r#"
            signals = ["save", "cancel"]

            [[elements]]
            name = "toolbar"
            tag = "div"

            [[elements]]
            name = "save-btn"
            tag = "button"
            parent = "toolbar"
            [elements.attributes]
            "data-signal" = "save"
            "data-signal-events" = "click"
            "data-signal-args" = '[1, "ok"]'

            [[steps]]
            action = "dispatch"
            element = "save-btn"
            event = "click"
            payload = '{"x": 10}'

            [[steps]]
            action = "set-attribute"
            element = "save-btn"
            attribute = "data-signal-events"
            value = "mouseover"

            [[steps]]
            action = "remove-element"
            element = "save-btn"
        "#;

        let scenario: Scenario = toml::from_str(toml_content).unwrap();
        assert_eq!(scenario.signals, vec!["save", "cancel"]);
        assert_eq!(scenario.elements.len(), 2);
        assert_eq!(scenario.elements[1].parent.as_deref(), Some("toolbar"));
        assert_eq!(
            scenario.elements[1].attributes.get("data-signal").unwrap(),
            "save"
        );
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(
            scenario.steps[0],
            StepConfig::Dispatch { .. }
        ));
        assert!(matches!(
            scenario.steps[2],
            StepConfig::RemoveElement { .. }
        ));
    }

    #[test]
    fn test_add_element_step() {
        let toml_content = r#"
            [[steps]]
            action = "add-element"
            [steps.element]
            name = "late-btn"
            tag = "button"
            parent = "toolbar"
        "#;

        let scenario: Scenario = toml::from_str(toml_content).unwrap();
        match &scenario.steps[0] {
            StepConfig::AddElement { element } => {
                assert_eq!(element.name, "late-btn");
                assert_eq!(element.parent.as_deref(), Some("toolbar"));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_load_scenario_missing_file() {
        let result = load_scenario(Path::new("/nonexistent/scenario.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_scenario_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        fs::write(&path, "signals = [\"save\"]\n").unwrap();

        let scenario = load_scenario(&path).unwrap();
        assert_eq!(scenario.signals, vec!["save"]);
        assert!(scenario.elements.is_empty());
        assert!(scenario.steps.is_empty());
    }
}
