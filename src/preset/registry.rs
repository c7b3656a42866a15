use super::definition::PresetDefinition;
use super::error::PresetError;
use super::graph::Preset;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only table of loaded presets
///
/// Populated once at startup. Invalid definitions are kept out of the table
/// and remembered in [`PresetRegistry::rejected`] so no session can bind to
/// them.
#[derive(Debug, Default, Clone)]
pub struct PresetRegistry {
    presets: HashMap<String, Arc<Preset>>,
    rejected: Vec<(String, PresetError)>,
}

impl PresetRegistry {
    /// Load every definition, skipping and recording the invalid ones
    pub fn from_definitions<'a>(defs: impl IntoIterator<Item = &'a PresetDefinition>) -> Self {
        let mut registry = PresetRegistry::default();

        for def in defs {
            if registry.presets.contains_key(&def.id) {
                tracing::warn!("Preset '{}' is defined twice, keeping the first", def.id);
                registry
                    .rejected
                    .push((def.id.clone(), PresetError::DuplicatePreset(def.id.clone())));
                continue;
            }

            match Preset::load(def) {
                Ok(preset) => {
                    let unreachable = preset.unreachable_nodes();
                    if !unreachable.is_empty() {
                        tracing::warn!(
                            "Preset '{}' has {} node(s) unreachable from '{}'",
                            preset.id(),
                            unreachable.len(),
                            preset.start_id()
                        );
                    }
                    tracing::debug!("Loaded preset '{}' ({} nodes)", preset.id(), preset.len());
                    registry.presets.insert(def.id.clone(), Arc::new(preset));
                }
                Err(e) => {
                    tracing::warn!("Rejected preset '{}': {}", def.id, e);
                    registry.rejected.push((def.id.clone(), e));
                }
            }
        }

        registry
    }

    pub fn get(&self, id: &str) -> Option<Arc<Preset>> {
        self.presets.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.presets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Ids of loaded presets, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Definitions that failed validation, with the reason
    pub fn rejected(&self) -> &[(String, PresetError)] {
        &self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::definition::NodeDefinition;

    #[test]
    fn test_registry_skips_invalid_presets() {
        let good = PresetDefinition::new("good", "a").node(NodeDefinition::new("a").allow("a"));
        let bad = PresetDefinition::new("bad", "missing").node(NodeDefinition::new("a"));
        let twice = PresetDefinition::new("good", "b").node(NodeDefinition::new("b"));

        let registry = PresetRegistry::from_definitions([&good, &bad, &twice]);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("good"));
        assert!(registry.get("bad").is_none());
        assert_eq!(registry.ids(), vec!["good"]);

        let rejected: Vec<&str> = registry.rejected().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(rejected, vec!["bad", "good"]);
        assert_eq!(registry.get("good").unwrap().start_id(), "a");
    }

    #[test]
    fn test_registry_shares_presets() {
        let def = PresetDefinition::new("p", "a").node(NodeDefinition::new("a"));
        let registry = PresetRegistry::from_definitions([&def]);
        let first = registry.get("p").unwrap();
        let second = registry.get("p").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
