//! Parallel session runner
//!
//! A fixed set of worker threads pulls [`SessionJob`]s off a crossbeam queue.
//! Each job is one complete session: normalize the window, segment it and
//! replay the segments through a fresh state machine. Jobs never share
//! mutable state; presets are shared through `Arc`.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::cancel::CancelToken;
use crate::error::{ActSeqError, Result, ResultExt};
use crate::machine::{SessionStatus, StateMachine, StateMachineLog};
use crate::observation::{Normalizer, RawObservation};
use crate::preset::Preset;
use crate::quota::{QuotaLimits, QuotaStatus};
use crate::segmentation::{Segment, SegmentationStats, Segmenter};

/// One session to run on the pool
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub preset: Arc<Preset>,
    pub observations: Vec<RawObservation>,
    pub limits: QuotaLimits,
}

/// Output of a pooled session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub job: u64,
    pub preset_id: String,
    pub status: SessionStatus,
    pub segments: Vec<Segment>,
    pub segmentation: SegmentationStats,
    pub log: StateMachineLog,
    pub quota: QuotaStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

struct Envelope {
    job_id: u64,
    job: SessionJob,
    cancel: CancelToken,
    reply: Sender<Result<SessionReport>>,
}

/// Caller's side of a submitted job
pub struct SessionHandle {
    job_id: u64,
    cancel: CancelToken,
    reply: Receiver<Result<SessionReport>>,
}

impl SessionHandle {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Ask the worker to stop before the next segment
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Block until the session finishes
    pub fn wait(self) -> Result<SessionReport> {
        self.reply
            .recv()
            .map_err(|_| ActSeqError::Channel(format!("worker dropped job {}", self.job_id)))?
    }

    /// Report if the session already finished
    pub fn try_wait(&self) -> Option<Result<SessionReport>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ActSeqError::Channel(format!(
                "worker dropped job {}",
                self.job_id
            )))),
        }
    }
}

/// Fixed-size pool of session workers
pub struct SessionPool {
    jobs: Option<Sender<Envelope>>,
    workers: Vec<JoinHandle<()>>,
    next_job: AtomicU64,
}

impl SessionPool {
    /// Spawn `workers` threads (at least one) sharing `segmenter`'s cost model
    pub fn new(workers: usize, segmenter: Segmenter) -> Result<Self> {
        let (tx, rx) = unbounded::<Envelope>();
        let count = workers.max(1);

        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let rx = rx.clone();
            let segmenter = segmenter.clone();
            let handle = std::thread::Builder::new()
                .name(format!("actseq-worker-{}", i))
                .spawn(move || worker_loop(rx, segmenter))?;
            handles.push(handle);
        }

        tracing::info!("Session pool started with {} worker(s)", count);

        Ok(Self {
            jobs: Some(tx),
            workers: handles,
            next_job: AtomicU64::new(1),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a session; returns immediately
    pub fn submit(&self, job: SessionJob) -> Result<SessionHandle> {
        let job_id = self.next_job.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        let (reply_tx, reply_rx) = bounded(1);

        let sender = self
            .jobs
            .as_ref()
            .ok_or_else(|| ActSeqError::Channel("session pool is shut down".to_string()))?;
        sender
            .send(Envelope {
                job_id,
                job,
                cancel: cancel.clone(),
                reply: reply_tx,
            })
            .map_err(|_| ActSeqError::Channel("session pool queue closed".to_string()))?;

        Ok(SessionHandle {
            job_id,
            cancel,
            reply: reply_rx,
        })
    }

    /// Close the queue and wait for queued jobs to drain
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Workers exit once the queue is closed and empty
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Session worker panicked");
            }
        }
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(rx: Receiver<Envelope>, segmenter: Segmenter) {
    while let Ok(envelope) = rx.recv() {
        let job_id = envelope.job_id;
        let result = run_job(job_id, envelope.job, &segmenter, &envelope.cancel);
        if let Err(e) = &result {
            tracing::warn!("Job {} failed: {}", job_id, e);
        }
        if envelope.reply.send(result).is_err() {
            tracing::trace!("Job {} finished after its handle was dropped", job_id);
        }
    }
}

/// Run one session start to finish on the current thread
pub fn run_job(
    job_id: u64,
    job: SessionJob,
    segmenter: &Segmenter,
    cancel: &CancelToken,
) -> Result<SessionReport> {
    let started_at = Utc::now();

    let window = Normalizer::new()
        .normalize_all(job.observations)
        .map_err(ActSeqError::from)
        .context(format!("Job #{}", job_id))?;
    let (segments, segmentation) = segmenter.segment_with_stats(&window);

    let mut machine = StateMachine::new(Arc::clone(&job.preset), job.limits);
    let summary = machine.advance(&segments, cancel);

    tracing::debug!(
        "Job {} on '{}': {} segments, {} accepted, {} rejected, {} unmapped -> {}",
        job_id,
        job.preset.id(),
        segments.len(),
        summary.accepted,
        summary.rejected,
        summary.unmapped,
        machine.status().display_name()
    );

    Ok(SessionReport {
        job: job_id,
        preset_id: job.preset.id().to_string(),
        status: machine.status(),
        quota: machine.quota_status(),
        log: machine.log().clone(),
        segments,
        segmentation,
        started_at,
        ended_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{NodeDefinition, PresetDefinition};
    use crate::segmentation::{CostModel, MismatchWeighting};

    fn preset() -> Arc<Preset> {
        Arc::new(
            Preset::load(
                &PresetDefinition::new("toggle", "off")
                    .node(NodeDefinition::new("off").allow("off").allow("on"))
                    .node(NodeDefinition::new("on").allow("off").allow("on"))
                    .map_label("off", "off")
                    .map_label("on", "on"),
            )
            .unwrap(),
        )
    }

    fn job(labels: &[&str]) -> SessionJob {
        SessionJob {
            preset: preset(),
            observations: labels
                .iter()
                .enumerate()
                .map(|(i, l)| RawObservation::action(i as u64, i as f64, *l, 0.9))
                .collect(),
            limits: QuotaLimits::unlimited(),
        }
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(CostModel::new(0.5, MismatchWeighting::Confidence))
    }

    #[test]
    fn test_run_job_directly() {
        let report = run_job(1, job(&["off", "on", "on"]), &segmenter(), &CancelToken::new()).unwrap();
        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.log.len(), 2);
    }

    #[test]
    fn test_run_job_rejects_malformed_window() {
        let mut bad = job(&["off", "on"]);
        bad.observations[1].confidence = 2.0;
        let err = run_job(1, bad, &segmenter(), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().starts_with("Job #1: "));
        assert!(matches!(err.root(), ActSeqError::MalformedObservation(_)));
    }

    #[test]
    fn test_pool_runs_jobs() {
        let pool = SessionPool::new(3, segmenter()).unwrap();
        assert_eq!(pool.worker_count(), 3);

        let handles: Vec<SessionHandle> = (0..10)
            .map(|_| pool.submit(job(&["off", "off", "on", "on", "off"])).unwrap())
            .collect();
        for handle in handles {
            let report = handle.wait().unwrap();
            assert_eq!(report.segments.len(), 3);
            assert_eq!(report.quota.consumed_transitions, 3);
        }
        pool.shutdown();
    }

    #[test]
    fn test_pre_cancelled_job_aborts() {
        let report = {
            let cancel = CancelToken::new();
            cancel.cancel();
            run_job(1, job(&["on", "off"]), &segmenter(), &cancel).unwrap()
        };
        assert_eq!(report.status, SessionStatus::Aborted);
        assert!(report.log.is_empty());
    }

    #[test]
    fn test_zero_workers_means_one() {
        let pool = SessionPool::new(0, segmenter()).unwrap();
        assert_eq!(pool.worker_count(), 1);
    }
}
