//! Optimal partition of an observation window into labelled segments
//!
//! Frame-level labels flicker. The [`Segmenter`] finds the partition of a
//! closed window of observations into contiguous segments that minimizes
//!
//! ```text
//! Σ mismatch(segment) + boundary_penalty × segment_count
//! ```
//!
//! where the mismatch of a segment is the weighted sum over members whose
//! label differs from the segment's dominant label (see [`CostModel`]).
//!
//! # Algorithm
//!
//! Per-label prefix sums ([`LabelTable`]) make every window cost O(1) per
//! candidate label. The dynamic program runs over suffixes: `best[i]` is the
//! cheapest partition of `[i, N)`. Reconstruction walks forward from 0 and
//! takes the earliest boundary that keeps the optimum, so among equal-cost
//! partitions the one with fewer segments wins, then the one with the
//! lexicographically smallest boundary sequence. Output is deterministic for
//! identical input and cost model.
//!
//! # Edge Cases
//!
//! - An empty window yields no segments
//! - A single observation yields one segment
//! - Observations without a label segment under [`ObservationLabel::Unknown`]

pub mod cost;

pub use cost::{CostModel, LabelTable, MismatchWeighting, WindowChoice, COST_EPSILON};

use crate::observation::{Observation, ObservationLabel};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A maximal run of observations assigned one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position of the first member within the window
    pub start: usize,
    /// Position of the last member within the window (inclusive)
    pub end: usize,
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub dominant_label: ObservationLabel,
    /// Mean confidence of the members agreeing with the dominant label
    pub mean_confidence: f64,
    /// Mismatch cost, excluding the boundary penalty
    pub cost: f64,
    /// Seconds charged to quota when this segment is accepted
    pub span: f64,
}

impl Segment {
    /// Number of observations in the segment
    pub fn observation_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn label(&self) -> &str {
        self.dominant_label.as_str()
    }
}

/// Timing and size information for one segmentation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationStats {
    pub observations: usize,
    pub distinct_labels: usize,
    pub segments: usize,
    /// Total cost including boundary penalties
    pub total_cost: f64,
    pub elapsed_us: u64,
}

/// Segments produced for one session window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub session: SessionId,
    pub segments: Vec<Segment>,
    pub stats: SegmentationStats,
}

impl SegmentationResult {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

/// Optimum for one suffix of the window
#[derive(Debug, Clone, Copy)]
struct Best {
    cost: f64,
    segments: u32,
    /// Exclusive end of the first segment of this suffix
    next: usize,
    label: usize,
    mismatch: f64,
}

impl Best {
    fn beats(&self, other: &Best) -> bool {
        if self.cost < other.cost - COST_EPSILON {
            return true;
        }
        (self.cost - other.cost).abs() <= COST_EPSILON && self.segments < other.segments
    }
}

/// Dynamic-programming partitioner
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    model: CostModel,
}

impl Segmenter {
    pub fn new(model: CostModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    /// Partition a closed window into segments covering every observation
    pub fn segment(&self, observations: &[Observation]) -> Vec<Segment> {
        self.segment_with_stats(observations).0
    }

    pub fn segment_with_stats(&self, observations: &[Observation]) -> (Vec<Segment>, SegmentationStats) {
        let start_time = Instant::now();
        let n = observations.len();
        if n == 0 {
            return (Vec::new(), SegmentationStats::default());
        }

        let table = LabelTable::build(observations, &self.model);
        let best = self.solve(&table, n);
        let segments = Self::reconstruct(observations, &table, &best);

        let stats = SegmentationStats {
            observations: n,
            distinct_labels: table.labels().len(),
            segments: segments.len(),
            total_cost: best[0].cost,
            elapsed_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::trace!(
            "Segmented {} observations into {} segments in {}us",
            n,
            stats.segments,
            stats.elapsed_us
        );

        (segments, stats)
    }

    /// Fill `best[i]` for every suffix `[i, n)`, from the back
    fn solve(&self, table: &LabelTable, n: usize) -> Vec<Best> {
        let sentinel = Best {
            cost: 0.0,
            segments: 0,
            next: n,
            label: 0,
            mismatch: 0.0,
        };
        let mut best = vec![sentinel; n + 1];

        for i in (0..n).rev() {
            let mut current: Option<Best> = None;
            // Ascending j: a later j only replaces an earlier one when strictly
            // better, which keeps the earliest boundary among ties
            for j in (i + 1)..=n {
                let choice = table.best_label(i, j);
                let candidate = Best {
                    cost: choice.cost + self.model.boundary_penalty + best[j].cost,
                    segments: best[j].segments + 1,
                    next: j,
                    label: choice.label,
                    mismatch: choice.cost,
                };
                match &current {
                    Some(c) if !candidate.beats(c) => {}
                    _ => current = Some(candidate),
                }
            }
            if let Some(c) = current {
                best[i] = c;
            }
        }

        best
    }

    fn reconstruct(observations: &[Observation], table: &LabelTable, best: &[Best]) -> Vec<Segment> {
        let n = observations.len();
        let mut segments = Vec::with_capacity(best[0].segments as usize);
        let mut i = 0;

        while i < n {
            let step = best[i];
            let j = step.next;
            let first = &observations[i];
            let last = &observations[j - 1];

            let agreeing = table.agreeing_count(i, j, step.label);
            let mean_confidence = if agreeing == 0 {
                0.0
            } else {
                table.agreeing_confidence(i, j, step.label) / agreeing as f64
            };

            // Charged until the next segment starts; the final segment only
            // covers its own observations
            let until = if j < n {
                observations[j].timestamp()
            } else {
                last.timestamp()
            };

            segments.push(Segment {
                start: i,
                end: j - 1,
                start_frame: first.frame_index(),
                end_frame: last.frame_index(),
                start_time: first.timestamp(),
                end_time: last.timestamp(),
                dominant_label: table.label(step.label).clone(),
                mean_confidence,
                cost: step.mismatch,
                span: (until - first.timestamp()).max(0.0),
            });

            i = j;
        }

        segments
    }
}
