//! Consumption ceilings and dwell budgets for a session
//!
//! Every accepted transition is charged against the session's quota: one
//! transition and the segment's span in seconds. [`QuotaEnforcer::check_and_reserve`]
//! decides and charges under one lock, so a check can never be separated
//! from its update. Counters only grow.
//!
//! Nodes with a dwell budget additionally accumulate the time spent in them.
//! Budgets never deny a transition; they raise [`BudgetAlarm`]s when a node
//! is occupied for longer than its upper bound.

use crate::preset::{DwellBudget, NodeIndex, Preset};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Configured ceilings of a session. Unset ceilings never deny.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(default)]
    pub max_transitions: Option<u64>,
    /// Seconds
    #[serde(default)]
    pub max_span: Option<f64>,
    #[serde(default = "default_budgets_enabled")]
    pub budgets_enabled: bool,
}

fn default_budgets_enabled() -> bool {
    true
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl QuotaLimits {
    pub fn unlimited() -> Self {
        Self {
            max_transitions: None,
            max_span: None,
            budgets_enabled: true,
        }
    }

    pub fn with_max_transitions(mut self, max: u64) -> Self {
        self.max_transitions = Some(max);
        self
    }

    pub fn with_max_span(mut self, max: f64) -> Self {
        self.max_span = Some(max);
        self
    }

    pub fn without_budgets(mut self) -> Self {
        self.budgets_enabled = false;
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_transitions.is_none() && self.max_span.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.max_span {
            Some(span) if !span.is_finite() || span < 0.0 => {
                Err(format!("max_span must be finite and >= 0, got {}", span))
            }
            _ => Ok(()),
        }
    }
}

/// Which ceiling refused a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaLimit {
    Transitions,
    Span,
}

/// Outcome of [`QuotaEnforcer::check_and_reserve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allow,
    Deny(QuotaLimit),
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmSeverity {
    Warning,
    Error,
}

/// Raised when a node is occupied past its dwell budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlarm {
    pub node_id: String,
    pub severity: AlarmSeverity,
    pub dwell: f64,
    pub upper: f64,
    pub message: String,
}

/// Progress of a node against its dwell budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetState {
    Unbudgeted,
    /// Below the lower bound
    Pending,
    Done,
    Overrun,
}

impl BudgetState {
    fn of(dwell: f64, budget: Option<&DwellBudget>) -> Self {
        match budget {
            None => BudgetState::Unbudgeted,
            Some(b) if dwell > b.upper => BudgetState::Overrun,
            Some(b) if dwell >= b.lower => BudgetState::Done,
            Some(_) => BudgetState::Pending,
        }
    }
}

/// Dwell accounting for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub node_id: String,
    pub dwell: f64,
    pub expected: Option<f64>,
    /// `dwell / expected`
    pub progress: Option<f64>,
    pub state: BudgetState,
}

/// Snapshot of a session's quota, handed to reporting collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub max_transitions: Option<u64>,
    pub max_span: Option<f64>,
    pub consumed_transitions: u64,
    pub consumed_span: f64,
    /// First ceiling that denied a reservation
    pub exceeded: Option<QuotaLimit>,
    pub nodes: Vec<NodeUsage>,
    pub alarms: Vec<BudgetAlarm>,
}

impl QuotaStatus {
    pub fn is_exceeded(&self) -> bool {
        self.exceeded.is_some()
    }

    pub fn remaining_transitions(&self) -> Option<u64> {
        self.max_transitions
            .map(|max| max.saturating_sub(self.consumed_transitions))
    }

    pub fn remaining_span(&self) -> Option<f64> {
        self.max_span.map(|max| (max - self.consumed_span).max(0.0))
    }
}

#[derive(Debug, Default)]
struct Counters {
    consumed_transitions: u64,
    consumed_span: f64,
    exceeded: Option<QuotaLimit>,
    dwell: Vec<f64>,
    alarm_level: Vec<Option<AlarmSeverity>>,
    alarms: Vec<BudgetAlarm>,
}

/// Atomic check-and-charge of a session's quota
#[derive(Debug)]
pub struct QuotaEnforcer {
    limits: QuotaLimits,
    node_ids: Vec<String>,
    budgets: Vec<Option<DwellBudget>>,
    state: Mutex<Counters>,
}

impl QuotaEnforcer {
    pub fn new(limits: QuotaLimits, preset: &Preset) -> Self {
        let n = preset.len();
        Self {
            limits,
            node_ids: preset.nodes().iter().map(|n| n.id().to_string()).collect(),
            budgets: preset.nodes().iter().map(|n| n.budget().copied()).collect(),
            state: Mutex::new(Counters {
                dwell: vec![0.0; n],
                alarm_level: vec![None; n],
                ..Default::default()
            }),
        }
    }

    pub fn limits(&self) -> &QuotaLimits {
        &self.limits
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Every update happens inside one critical section, so the counters
        // are consistent even if a holder panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether one more transition of `delta_span` seconds into
    /// `node` fits, and charge it if so. A denial leaves the counters
    /// untouched.
    pub fn check_and_reserve(&self, node: NodeIndex, delta_span: f64) -> QuotaDecision {
        let delta = if delta_span.is_finite() {
            delta_span.max(0.0)
        } else {
            0.0
        };

        let mut state = self.lock();

        let next_transitions = state.consumed_transitions + 1;
        let next_span = state.consumed_span + delta;
        let denied = if self
            .limits
            .max_transitions
            .is_some_and(|max| next_transitions > max)
        {
            Some(QuotaLimit::Transitions)
        } else if self.limits.max_span.is_some_and(|max| next_span > max) {
            Some(QuotaLimit::Span)
        } else {
            None
        };

        if let Some(limit) = denied {
            state.exceeded.get_or_insert(limit);
            return QuotaDecision::Deny(limit);
        }

        state.consumed_transitions = next_transitions;
        state.consumed_span = next_span;

        if self.limits.budgets_enabled && node.index() < state.dwell.len() {
            self.charge_dwell(&mut state, node, delta);
        }

        QuotaDecision::Allow
    }

    fn charge_dwell(&self, state: &mut Counters, node: NodeIndex, delta: f64) {
        let i = node.index();
        state.dwell[i] += delta;

        let Some(budget) = self.budgets[i] else {
            return;
        };
        let dwell = state.dwell[i];
        let thresholds = [
            (AlarmSeverity::Warning, budget.upper),
            (AlarmSeverity::Error, 2.0 * budget.upper),
        ];

        // One charge can cross both thresholds; each severity is raised once
        for (severity, threshold) in thresholds {
            if dwell <= threshold || Some(severity) <= state.alarm_level[i] {
                continue;
            }
            state.alarm_level[i] = Some(severity);
            let node_id = &self.node_ids[i];
            let message = format!(
                "Timeout in {}: {:.1}s spent, {:.1}s allowed",
                node_id, dwell, budget.upper
            );
            tracing::warn!("{}", message);
            state.alarms.push(BudgetAlarm {
                node_id: node_id.clone(),
                severity,
                dwell,
                upper: budget.upper,
                message,
            });
        }
    }

    pub fn status(&self) -> QuotaStatus {
        let state = self.lock();

        let nodes = self
            .node_ids
            .iter()
            .zip(&self.budgets)
            .zip(&state.dwell)
            .filter(|((_, budget), &dwell)| budget.is_some() || dwell > 0.0)
            .map(|((node_id, budget), &dwell)| NodeUsage {
                node_id: node_id.clone(),
                dwell,
                expected: budget.map(|b| b.expected),
                progress: budget.map(|b| dwell / b.expected),
                state: BudgetState::of(dwell, budget.as_ref()),
            })
            .collect();

        QuotaStatus {
            max_transitions: self.limits.max_transitions,
            max_span: self.limits.max_span,
            consumed_transitions: state.consumed_transitions,
            consumed_span: state.consumed_span,
            exceeded: state.exceeded,
            nodes,
            alarms: state.alarms.clone(),
        }
    }
}
