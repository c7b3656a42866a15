//! Test data builders for creating test objects

use actseq_rs::observation::RawObservation;
use actseq_rs::preset::{BudgetDefinition, NodeDefinition, Preset, PresetDefinition};
use std::sync::Arc;

/// Builder for a stream of raw observations at a fixed frame rate
pub struct ObservationStream {
    next_frame: u64,
    frame_interval: f64,
    confidence: f64,
    observations: Vec<RawObservation>,
}

impl ObservationStream {
    pub fn new() -> Self {
        Self {
            next_frame: 0,
            frame_interval: 1.0,
            confidence: 0.9,
            observations: Vec::new(),
        }
    }

    pub fn starting_at(mut self, frame: u64) -> Self {
        self.next_frame = frame;
        self
    }

    pub fn interval(mut self, seconds: f64) -> Self {
        self.frame_interval = seconds;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    fn timestamp(&self) -> f64 {
        self.next_frame as f64 * self.frame_interval
    }

    /// Append one frame per action label
    pub fn actions(mut self, labels: &[&str]) -> Self {
        for label in labels {
            let obs =
                RawObservation::action(self.next_frame, self.timestamp(), *label, self.confidence);
            self.observations.push(obs);
            self.next_frame += 1;
        }
        self
    }

    /// Append one frame with both an action and an object
    pub fn action_on(mut self, action: &str, object: &str) -> Self {
        let obs = RawObservation::action(self.next_frame, self.timestamp(), action, self.confidence)
            .with_object(object);
        self.observations.push(obs);
        self.next_frame += 1;
        self
    }

    /// Append frames without any classification
    pub fn unlabeled(mut self, count: usize) -> Self {
        for _ in 0..count {
            let obs = RawObservation::unlabeled(self.next_frame, self.timestamp(), self.confidence);
            self.observations.push(obs);
            self.next_frame += 1;
        }
        self
    }

    pub fn build(self) -> Vec<RawObservation> {
        self.observations
    }
}

/// Builder for preset definitions
pub struct PresetBuilder {
    def: PresetDefinition,
}

impl PresetBuilder {
    pub fn new(id: &str, start: &str) -> Self {
        Self {
            def: PresetDefinition::new(id, start),
        }
    }

    pub fn node(mut self, id: &str, next: &[&str]) -> Self {
        let node = next
            .iter()
            .fold(NodeDefinition::new(id), |node, n| node.allow(*n));
        self.def = self.def.node(node);
        self
    }

    pub fn budgeted_node(mut self, id: &str, next: &[&str], expected: f64) -> Self {
        let node = next
            .iter()
            .fold(NodeDefinition::new(id), |node, n| node.allow(*n))
            .budget(BudgetDefinition::expected(expected));
        self.def = self.def.node(node);
        self
    }

    pub fn map(mut self, label: &str, node: &str) -> Self {
        self.def = self.def.map_label(label, node);
        self
    }

    pub fn fallback(mut self, label: &str) -> Self {
        self.def = self.def.fallback(label);
        self
    }

    pub fn definition(self) -> PresetDefinition {
        self.def
    }

    pub fn build(self) -> Arc<Preset> {
        Arc::new(Preset::load(&self.def).expect("test preset must be valid"))
    }
}

/// Idle/Working preset where every transition is allowed
pub fn idle_working() -> PresetBuilder {
    PresetBuilder::new("idle-working", "Idle")
        .node("Idle", &["Idle", "Working"])
        .node("Working", &["Idle", "Working"])
        .map("A", "Idle")
        .map("B", "Working")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_stream() {
        let obs = ObservationStream::new()
            .interval(0.5)
            .actions(&["A", "B"])
            .unlabeled(1)
            .build();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[2].frame_index, 2);
        assert_eq!(obs[1].timestamp, 0.5);
        assert!(obs[2].action_label.is_none());
    }
}
