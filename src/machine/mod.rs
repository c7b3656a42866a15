//! State machine execution engine
//!
//! A [`StateMachine`] replays segments against one preset. For every segment
//! in order it resolves the segment's label to a node, checks the transition
//! against the preset graph, asks the quota for permission, and records the
//! outcome in its [`StateMachineLog`].
//!
//! # Outcomes per segment
//!
//! - Label maps to no node: an [`UnmappedLabel`] entry, processing continues,
//!   the session ends up `Incomplete`
//! - Transition not allowed (even via the fallback label): a
//!   [`RejectedTransition`] entry, the current node stays put
//! - Quota denies: nothing is logged, processing stops, the session is
//!   `QuotaExceeded`
//! - Otherwise: a [`Transition`] entry and the current node advances
//!
//! The engine only stores the index of its current node and re-resolves it
//! against the shared preset on every step.

pub mod log;
pub mod resolver;

pub use log::{LogEntry, RejectedTransition, StateMachineLog, Transition, UnmappedLabel};
pub use resolver::{LabelResolver, PresetLabelResolver};

use crate::preset::{NodeIndex, Preset};
use crate::quota::{QuotaDecision, QuotaEnforcer, QuotaLimit, QuotaLimits, QuotaStatus};
use crate::segmentation::Segment;
use crate::session::CancelToken;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, or between windows
    #[default]
    Active,
    /// Every segment so far was mapped
    Completed,
    /// At least one segment label was unmapped
    Incomplete,
    /// A quota ceiling denied a transition
    QuotaExceeded,
    /// Cancelled between segments
    Aborted,
}

impl SessionStatus {
    /// Terminal sessions accept no further segments
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::QuotaExceeded | SessionStatus::Aborted)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Completed => "Completed",
            SessionStatus::Incomplete => "Incomplete",
            SessionStatus::QuotaExceeded => "Quota Exceeded",
            SessionStatus::Aborted => "Aborted",
        }
    }
}

/// What happened to a single segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted { via_fallback: bool },
    Rejected,
    Unmapped,
    QuotaDenied(QuotaLimit),
}

/// Counts for one call to [`StateMachine::advance`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceSummary {
    pub processed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub unmapped: usize,
}

/// One session's runtime: current node, log and quota
pub struct StateMachine {
    preset: Arc<Preset>,
    resolver: Arc<dyn LabelResolver>,
    current: NodeIndex,
    log: StateMachineLog,
    quota: QuotaEnforcer,
    status: SessionStatus,
    unmapped: usize,
}

impl StateMachine {
    pub fn new(preset: Arc<Preset>, limits: QuotaLimits) -> Self {
        Self::with_resolver(preset, limits, Arc::new(PresetLabelResolver))
    }

    pub fn with_resolver(
        preset: Arc<Preset>,
        limits: QuotaLimits,
        resolver: Arc<dyn LabelResolver>,
    ) -> Self {
        let quota = QuotaEnforcer::new(limits, &preset);
        Self {
            current: preset.start(),
            preset,
            resolver,
            log: StateMachineLog::new(),
            quota,
            status: SessionStatus::Active,
            unmapped: 0,
        }
    }

    pub fn preset(&self) -> &Arc<Preset> {
        &self.preset
    }

    pub fn current(&self) -> NodeIndex {
        self.current
    }

    pub fn current_id(&self) -> &str {
        self.preset.node_id(self.current)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn log(&self) -> &StateMachineLog {
        &self.log
    }

    pub fn quota_status(&self) -> QuotaStatus {
        self.quota.status()
    }

    /// Apply one segment
    pub fn step(&mut self, segment: &Segment) -> StepOutcome {
        let from = self.current;

        let Some(target) = self.resolver.resolve(&self.preset, &segment.dominant_label) else {
            tracing::debug!(
                "No node for label '{}' (frames {}-{})",
                segment.dominant_label,
                segment.start_frame,
                segment.end_frame
            );
            self.unmapped += 1;
            self.log.push_unmapped(segment);
            return StepOutcome::Unmapped;
        };

        let (target, via_fallback) = if self.preset.allows(from, target) {
            (target, false)
        } else {
            let fallback = self
                .resolver
                .fallback(&self.preset)
                .filter(|&fb| fb != target && self.preset.allows(from, fb));
            match fallback {
                Some(fb) => (fb, true),
                None => {
                    tracing::debug!(
                        "Rejected {} -> {} for label '{}'",
                        self.preset.node_id(from),
                        self.preset.node_id(target),
                        segment.dominant_label
                    );
                    self.log.push_rejected(
                        self.preset.node_id(from),
                        self.preset.node_id(target),
                        segment,
                    );
                    return StepOutcome::Rejected;
                }
            }
        };

        match self.quota.check_and_reserve(target, segment.span) {
            QuotaDecision::Allow => {
                self.log.push_transition(
                    self.preset.node_id(from),
                    self.preset.node_id(target),
                    segment,
                    via_fallback,
                );
                self.current = target;
                StepOutcome::Accepted { via_fallback }
            }
            QuotaDecision::Deny(limit) => {
                tracing::info!(
                    "Quota ({:?}) exhausted at {} -> {}",
                    limit,
                    self.preset.node_id(from),
                    self.preset.node_id(target)
                );
                StepOutcome::QuotaDenied(limit)
            }
        }
    }

    /// Apply segments in order until they run out, the quota denies, or the
    /// token is cancelled. Cancellation is observed between segments only.
    pub fn advance(&mut self, segments: &[Segment], cancel: &CancelToken) -> AdvanceSummary {
        let mut summary = AdvanceSummary::default();
        if self.status.is_terminal() {
            return summary;
        }

        for segment in segments {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Session on preset '{}' aborted after {} segment(s)",
                    self.preset.id(),
                    summary.processed
                );
                self.status = SessionStatus::Aborted;
                return summary;
            }

            match self.step(segment) {
                StepOutcome::Accepted { .. } => summary.accepted += 1,
                StepOutcome::Rejected => summary.rejected += 1,
                StepOutcome::Unmapped => summary.unmapped += 1,
                StepOutcome::QuotaDenied(_) => {
                    self.status = SessionStatus::QuotaExceeded;
                    return summary;
                }
            }
            summary.processed += 1;
        }

        self.status = if self.unmapped > 0 {
            SessionStatus::Incomplete
        } else {
            SessionStatus::Completed
        };
        summary
    }

    /// Stop the session without processing more segments
    pub fn abort(&mut self) {
        if !self.status.is_terminal() {
            self.status = SessionStatus::Aborted;
        }
    }

    /// Give up the log, leaving an empty one behind
    pub(crate) fn take_log(&mut self) -> StateMachineLog {
        std::mem::take(&mut self.log)
    }
}
