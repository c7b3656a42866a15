//! Cost model and per-label prefix sums for the partitioner.

use crate::observation::{Observation, ObservationLabel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Costs closer than this are treated as equal when breaking ties
pub const COST_EPSILON: f64 = 1e-9;

/// How much a member that disagrees with its segment's label costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchWeighting {
    /// The disagreeing member's own confidence
    #[default]
    Confidence,
    /// `1 - confidence` of the disagreeing member
    InverseConfidence,
    /// Every disagreeing member costs 1
    Uniform,
}

impl MismatchWeighting {
    #[inline]
    pub fn weight(self, confidence: f64) -> f64 {
        match self {
            MismatchWeighting::Confidence => confidence,
            MismatchWeighting::InverseConfidence => 1.0 - confidence,
            MismatchWeighting::Uniform => 1.0,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MismatchWeighting::Confidence => "confidence",
            MismatchWeighting::InverseConfidence => "inverse confidence",
            MismatchWeighting::Uniform => "uniform",
        }
    }
}

/// Tunable parameters of the partitioner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Charged once per segment
    #[serde(default = "default_boundary_penalty")]
    pub boundary_penalty: f64,
    /// Scales the summed mismatch weight of a segment
    #[serde(default = "default_mismatch_weight")]
    pub mismatch_weight: f64,
    #[serde(default)]
    pub weighting: MismatchWeighting,
}

fn default_boundary_penalty() -> f64 {
    1.0
}

fn default_mismatch_weight() -> f64 {
    1.0
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            boundary_penalty: default_boundary_penalty(),
            mismatch_weight: default_mismatch_weight(),
            weighting: MismatchWeighting::default(),
        }
    }
}

impl CostModel {
    pub fn new(boundary_penalty: f64, weighting: MismatchWeighting) -> Self {
        Self {
            boundary_penalty,
            weighting,
            ..Default::default()
        }
    }

    /// Check parameter ranges, naming the offending field
    pub fn validate(&self) -> Result<(), String> {
        if !self.boundary_penalty.is_finite() || self.boundary_penalty < 0.0 {
            return Err(format!(
                "boundary_penalty must be finite and >= 0, got {}",
                self.boundary_penalty
            ));
        }
        if !self.mismatch_weight.is_finite() || self.mismatch_weight <= 0.0 {
            return Err(format!(
                "mismatch_weight must be finite and > 0, got {}",
                self.mismatch_weight
            ));
        }
        Ok(())
    }
}

/// Best label for a window and what it costs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowChoice {
    pub label: usize,
    pub cost: f64,
}

/// Prefix sums over one observation window, one row per distinct label.
///
/// After O(N·L) preprocessing the mismatch cost of any window `[i, j)` under
/// any label is answered in O(1).
pub struct LabelTable {
    labels: Vec<ObservationLabel>,
    /// `weight[l][k]` = summed mismatch weight of label-`l` members in `[0, k)`
    weight: Vec<Vec<f64>>,
    /// `confidence[l][k]` = summed confidence of label-`l` members in `[0, k)`
    confidence: Vec<Vec<f64>>,
    count: Vec<Vec<u32>>,
    total_weight: Vec<f64>,
    mismatch_weight: f64,
}

impl LabelTable {
    pub fn build(observations: &[Observation], model: &CostModel) -> Self {
        let n = observations.len();

        // Intern labels in order of first appearance
        let mut labels: Vec<ObservationLabel> = Vec::new();
        let mut interned: HashMap<&ObservationLabel, usize> = HashMap::new();
        let member_label: Vec<usize> = observations
            .iter()
            .map(|obs| {
                *interned.entry(obs.label()).or_insert_with(|| {
                    labels.push(obs.label().clone());
                    labels.len() - 1
                })
            })
            .collect();

        let l = labels.len();
        let mut weight = vec![vec![0.0; n + 1]; l];
        let mut confidence = vec![vec![0.0; n + 1]; l];
        let mut count = vec![vec![0u32; n + 1]; l];
        let mut total_weight = vec![0.0; n + 1];

        for (k, obs) in observations.iter().enumerate() {
            let w = model.weighting.weight(obs.confidence());
            total_weight[k + 1] = total_weight[k] + w;
            for label in 0..l {
                let own = member_label[k] == label;
                weight[label][k + 1] = weight[label][k] + if own { w } else { 0.0 };
                confidence[label][k + 1] =
                    confidence[label][k] + if own { obs.confidence() } else { 0.0 };
                count[label][k + 1] = count[label][k] + u32::from(own);
            }
        }

        Self {
            labels,
            weight,
            confidence,
            count,
            total_weight,
            mismatch_weight: model.mismatch_weight,
        }
    }

    pub fn labels(&self) -> &[ObservationLabel] {
        &self.labels
    }

    pub fn label(&self, idx: usize) -> &ObservationLabel {
        &self.labels[idx]
    }

    /// Cost of treating `[i, j)` as one segment labelled `label`
    #[inline]
    pub fn mismatch(&self, i: usize, j: usize, label: usize) -> f64 {
        let all = self.total_weight[j] - self.total_weight[i];
        let own = self.weight[label][j] - self.weight[label][i];
        ((all - own) * self.mismatch_weight).max(0.0)
    }

    #[inline]
    pub fn agreeing_confidence(&self, i: usize, j: usize, label: usize) -> f64 {
        self.confidence[label][j] - self.confidence[label][i]
    }

    #[inline]
    pub fn agreeing_count(&self, i: usize, j: usize, label: usize) -> u32 {
        self.count[label][j] - self.count[label][i]
    }

    /// Cheapest label for `[i, j)`.
    ///
    /// Equal costs go to the label with more agreeing confidence, then to the
    /// label that appeared first in the window.
    pub fn best_label(&self, i: usize, j: usize) -> WindowChoice {
        let mut best = WindowChoice {
            label: 0,
            cost: f64::INFINITY,
        };
        let mut best_support = f64::NEG_INFINITY;

        for label in 0..self.labels.len() {
            let cost = self.mismatch(i, j, label);
            let support = self.agreeing_confidence(i, j, label);
            let better = cost < best.cost - COST_EPSILON
                || ((cost - best.cost).abs() <= COST_EPSILON && support > best_support + COST_EPSILON);
            if better {
                best = WindowChoice { label, cost };
                best_support = support;
            }
        }

        best
    }
}
