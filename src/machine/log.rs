//! Append-only record of what a session did with each segment.

use crate::error::{ActSeqError, Result};
use crate::observation::ObservationLabel;
use crate::segmentation::Segment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An accepted state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from_node_id: String,
    pub to_node_id: String,
    pub segment: Segment,
    /// Position in the session log
    pub accepted_at: u64,
    /// Accepted through the preset's fallback label
    #[serde(default)]
    pub via_fallback: bool,
}

/// A state change the preset does not allow from the current node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedTransition {
    pub from_node_id: String,
    pub to_node_id: String,
    pub segment: Segment,
    pub seq: u64,
}

/// A segment whose label maps to no node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmappedLabel {
    pub label: ObservationLabel,
    pub segment: Segment,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Transition(Transition),
    Rejected(RejectedTransition),
    Unmapped(UnmappedLabel),
}

impl LogEntry {
    pub fn seq(&self) -> u64 {
        match self {
            LogEntry::Transition(t) => t.accepted_at,
            LogEntry::Rejected(r) => r.seq,
            LogEntry::Unmapped(u) => u.seq,
        }
    }

    pub fn segment(&self) -> &Segment {
        match self {
            LogEntry::Transition(t) => &t.segment,
            LogEntry::Rejected(r) => &r.segment,
            LogEntry::Unmapped(u) => &u.segment,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            LogEntry::Transition(t) => Some(t),
            _ => None,
        }
    }
}

/// Totally ordered log of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachineLog {
    entries: Vec<LogEntry>,
}

impl StateMachineLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.entries.len() as u64
    }

    pub(crate) fn push_transition(
        &mut self,
        from_node_id: &str,
        to_node_id: &str,
        segment: &Segment,
        via_fallback: bool,
    ) {
        let accepted_at = self.next_seq();
        self.entries.push(LogEntry::Transition(Transition {
            from_node_id: from_node_id.to_string(),
            to_node_id: to_node_id.to_string(),
            segment: segment.clone(),
            accepted_at,
            via_fallback,
        }));
    }

    pub(crate) fn push_rejected(&mut self, from_node_id: &str, to_node_id: &str, segment: &Segment) {
        let seq = self.next_seq();
        self.entries.push(LogEntry::Rejected(RejectedTransition {
            from_node_id: from_node_id.to_string(),
            to_node_id: to_node_id.to_string(),
            segment: segment.clone(),
            seq,
        }));
    }

    pub(crate) fn push_unmapped(&mut self, segment: &Segment) {
        let seq = self.next_seq();
        self.entries.push(LogEntry::Unmapped(UnmappedLabel {
            label: segment.dominant_label.clone(),
            segment: segment.clone(),
            seq,
        }));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter().filter_map(LogEntry::as_transition)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RejectedTransition> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Rejected(r) => Some(r),
            _ => None,
        })
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &UnmappedLabel> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Unmapped(u) => Some(u),
            _ => None,
        })
    }

    /// Save the log to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ActSeqError::Serialization(format!("Failed to serialize log: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a log from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| ActSeqError::Serialization(format!("Failed to parse log: {}", e)))
    }
}
