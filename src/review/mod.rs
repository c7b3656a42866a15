//! Post-run statistics over session logs
//!
//! Used by reporting collaborators once sessions are archived: how long each
//! step usually takes across many runs, and a de-noised timeline of a single
//! run.

use crate::machine::{StateMachineLog, Transition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Dwell statistics of one node across many logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    pub node_id: String,
    pub occurrences: usize,
    /// Seconds
    pub mean_dwell: f64,
    /// Sample standard deviation, 0 for a single occurrence
    pub std_dev: f64,
}

/// Mean and sample standard deviation of the span of every accepted
/// transition into each node, sorted by node id.
pub fn step_stats<'a>(logs: impl IntoIterator<Item = &'a StateMachineLog>) -> Vec<StepStats> {
    let mut spans: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for log in logs {
        for transition in log.transitions() {
            spans
                .entry(transition.to_node_id.as_str())
                .or_default()
                .push(transition.segment.span);
        }
    }

    spans
        .into_iter()
        .map(|(node_id, samples)| {
            let n = samples.len();
            let mean = samples.iter().sum::<f64>() / n as f64;
            let std_dev = if n > 1 {
                let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
                var.sqrt()
            } else {
                0.0
            };
            StepStats {
                node_id: node_id.to_string(),
                occurrences: n,
                mean_dwell: mean,
                std_dev,
            }
        })
        .collect()
}

/// Keep only the longest accepted visit of each node, in log order
pub fn longest_visits(log: &StateMachineLog) -> Vec<&Transition> {
    let mut longest: HashMap<&str, &Transition> = HashMap::new();
    for transition in log.transitions() {
        longest
            .entry(transition.to_node_id.as_str())
            .and_modify(|best| {
                if transition.segment.span > best.segment.span {
                    *best = transition;
                }
            })
            .or_insert(transition);
    }

    let mut visits: Vec<&Transition> = longest.into_values().collect();
    visits.sort_by_key(|t| t.accepted_at);
    visits
}
