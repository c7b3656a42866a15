use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::cancel::CancelToken;
use super::types::{AdvanceReport, SessionArchive, SessionId};
use crate::error::{ActSeqError, Result, ResultExt};
use crate::machine::{LabelResolver, SessionStatus, StateMachine};
use crate::observation::{Normalizer, RawObservation};
use crate::preset::{Preset, PresetRegistry};
use crate::quota::QuotaLimits;
use crate::segmentation::{SegmentationResult, Segmenter};

struct Session {
    machine: StateMachine,
    normalizer: Normalizer,
    cancel: CancelToken,
    windows: usize,
    started_at: DateTime<Utc>,
}

/// Live sessions of one engine instance
///
/// Sessions are created and destroyed explicitly. Each owns its state
/// machine, quota and frame-order tracking; presets are shared.
pub struct SessionTable {
    segmenter: Segmenter,
    sessions: HashMap<SessionId, Session>,
    next_id: u64,
}

impl SessionTable {
    pub fn new(segmenter: Segmenter) -> Self {
        Self {
            segmenter,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Start a session bound to `preset`
    pub fn create(&mut self, preset: Arc<Preset>, limits: QuotaLimits) -> SessionId {
        let machine = StateMachine::new(preset, limits);
        self.insert(machine)
    }

    /// Start a session with a custom label resolver
    pub fn create_with_resolver(
        &mut self,
        preset: Arc<Preset>,
        limits: QuotaLimits,
        resolver: Arc<dyn LabelResolver>,
    ) -> SessionId {
        let machine = StateMachine::with_resolver(preset, limits, resolver);
        self.insert(machine)
    }

    /// Start a session on a registered preset
    pub fn create_from_registry(
        &mut self,
        registry: &PresetRegistry,
        preset_id: &str,
        limits: QuotaLimits,
    ) -> Result<SessionId> {
        let preset = registry
            .get(preset_id)
            .ok_or_else(|| ActSeqError::UnknownPreset(preset_id.to_string()))?;
        Ok(self.create(preset, limits))
    }

    fn insert(&mut self, machine: StateMachine) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;

        tracing::info!(
            "Created {} on preset '{}' at node '{}'",
            id,
            machine.preset().id(),
            machine.current_id()
        );

        self.sessions.insert(
            id,
            Session {
                machine,
                normalizer: Normalizer::new(),
                cancel: CancelToken::new(),
                windows: 0,
                started_at: Utc::now(),
            },
        );
        id
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut Session> {
        self.sessions
            .get_mut(&id)
            .ok_or(ActSeqError::UnknownSession(id))
    }

    /// Validate and segment a closed window of observations.
    ///
    /// A malformed observation rejects the whole window; frame order is
    /// enforced against earlier windows of the same session.
    pub fn ingest(
        &mut self,
        id: SessionId,
        observations: Vec<RawObservation>,
    ) -> Result<SegmentationResult> {
        let segmenter = self.segmenter.clone();
        let session = self.session_mut(id)?;

        let window = session
            .normalizer
            .normalize_all(observations)
            .map_err(ActSeqError::from)
            .with_context(|| format!("{} window {}", id, session.windows + 1))?;
        let (segments, stats) = segmenter.segment_with_stats(&window);
        session.windows += 1;

        tracing::debug!(
            "{} window {}: {} observations -> {} segments ({}us)",
            id,
            session.windows,
            stats.observations,
            stats.segments,
            stats.elapsed_us
        );

        Ok(SegmentationResult {
            session: id,
            segments,
            stats,
        })
    }

    /// Apply a segmentation result to the session that produced it
    pub fn advance(&mut self, id: SessionId, result: &SegmentationResult) -> Result<AdvanceReport> {
        if result.session != id {
            return Err(ActSeqError::SessionMismatch {
                expected: id,
                found: result.session,
            });
        }
        let session = self.session_mut(id)?;
        if session.machine.status().is_terminal() {
            return Err(ActSeqError::SessionFinished(id));
        }

        let summary = session.machine.advance(&result.segments, &session.cancel);

        Ok(AdvanceReport {
            session: id,
            status: session.machine.status(),
            summary,
            log: session.machine.log().clone(),
            quota: session.machine.quota_status(),
        })
    }

    /// Token that aborts the session before its next segment
    pub fn cancel_token(&self, id: SessionId) -> Result<CancelToken> {
        self.sessions
            .get(&id)
            .map(|s| s.cancel.clone())
            .ok_or(ActSeqError::UnknownSession(id))
    }

    pub fn status(&self, id: SessionId) -> Result<SessionStatus> {
        self.sessions
            .get(&id)
            .map(|s| s.machine.status())
            .ok_or(ActSeqError::UnknownSession(id))
    }

    /// Remove the session and return its archive
    pub fn destroy(&mut self, id: SessionId) -> Result<SessionArchive> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(ActSeqError::UnknownSession(id))?;

        // A finished session keeps its outcome even if cancelled afterwards
        if session.cancel.is_cancelled() && session.machine.status() == SessionStatus::Active {
            session.machine.abort();
        }

        let archive = SessionArchive {
            session: id,
            preset_id: session.machine.preset().id().to_string(),
            status: session.machine.status(),
            quota: session.machine.quota_status(),
            log: session.machine.take_log(),
            windows: session.windows,
            started_at: session.started_at,
            ended_at: Utc::now(),
        };

        tracing::info!(
            "Destroyed {} ({}, {} log entries)",
            id,
            archive.status.display_name(),
            archive.log.len()
        );
        Ok(archive)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of live sessions, sorted
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
