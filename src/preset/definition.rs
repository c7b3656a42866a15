//! Serializable preset definitions.
//!
//! A [`PresetDefinition`] is what configuration files and the host
//! application hand to the engine. It is unvalidated; [`Preset::load`](super::Preset::load)
//! turns it into the immutable graph sessions bind to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ActSeqError, Result};

/// Expected time spent in a node, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetDefinition {
    pub expected: f64,
    /// Defaults to 0.4 × expected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    /// Defaults to 1.6 × expected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

impl BudgetDefinition {
    pub fn expected(expected: f64) -> Self {
        Self {
            expected,
            lower: None,
            upper: None,
        }
    }
}

/// One state of a preset graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub allowed_next: Vec<String>,
    /// Action names this node accepts, matched case-insensitively
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetDefinition>,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            allowed_next: Vec::new(),
            aliases: Vec::new(),
            budget: None,
        }
    }

    pub fn allow(mut self, next: impl Into<String>) -> Self {
        self.allowed_next.push(next.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn budget(mut self, budget: BudgetDefinition) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// A named workflow graph as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_node: String,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Segment label -> node id
    #[serde(default)]
    pub label_map: BTreeMap<String, String>,
    /// Label retried when a segment's own target is not reachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_label: Option<String>,
}

impl PresetDefinition {
    pub fn new(id: impl Into<String>, start_node: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            start_node: start_node.into(),
            nodes: Vec::new(),
            label_map: BTreeMap::new(),
            fallback_label: None,
        }
    }

    pub fn node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn map_label(mut self, label: impl Into<String>, node: impl Into<String>) -> Self {
        self.label_map.insert(label.into(), node.into());
        self
    }

    pub fn fallback(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = Some(label.into());
        self
    }

    /// Load a definition from a JSON file
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ActSeqError::Config(format!("Failed to parse preset {:?}: {}", path, e))
        })
    }

    /// Save the definition as pretty JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_definition_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assembly.json");

        let def = PresetDefinition::new("assembly", "idle")
            .node(NodeDefinition::new("idle").allow("idle").allow("work"))
            .node(
                NodeDefinition::new("work")
                    .allow("idle")
                    .alias("Screw")
                    .budget(BudgetDefinition::expected(30.0)),
            )
            .map_label("rest", "idle")
            .fallback("rest");
        def.save_json(&path).unwrap();

        let loaded = PresetDefinition::load_json(&path).unwrap();
        assert_eq!(loaded, def);
    }

    #[test]
    fn test_definition_defaults() {
        let json = r#"{"id": "p", "start_node": "a", "nodes": [{"id": "a"}]}"#;
        let def: PresetDefinition = serde_json::from_str(json).unwrap();
        assert!(def.label_map.is_empty());
        assert!(def.nodes[0].allowed_next.is_empty());
        assert_eq!(def.fallback_label, None);
    }

    #[test]
    fn test_load_json_reports_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = PresetDefinition::load_json(&path).unwrap_err();
        assert!(matches!(err, ActSeqError::Config(_)));
    }
}
