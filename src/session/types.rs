//! Session data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::machine::{AdvanceSummary, SessionStatus, StateMachineLog};
use crate::quota::QuotaStatus;

/// Key of a session in a [`SessionTable`](super::SessionTable)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session#{}", self.0)
    }
}

/// Result of applying one segmentation window to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceReport {
    pub session: SessionId,
    pub status: SessionStatus,
    pub summary: AdvanceSummary,
    /// Full log of the session so far
    pub log: StateMachineLog,
    pub quota: QuotaStatus,
}

/// Everything kept about a session once it is destroyed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArchive {
    pub session: SessionId,
    pub preset_id: String,
    pub status: SessionStatus,
    pub log: StateMachineLog,
    pub quota: QuotaStatus,
    /// Number of windows ingested
    pub windows: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionArchive {
    /// Wall-clock lifetime of the session
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }

    /// Save archive to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load archive from a file
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
