//! Per-frame detection evidence
//!
//! The external vision pipeline reports, for every analysed frame, an optional
//! action classification, an optional object classification, a confidence and
//! an optional bounding region. This module turns those raw records into
//! validated [`Observation`]s.
//!
//! # Main Types
//!
//! - [`RawObservation`] - Unvalidated record as delivered by the vision pipeline
//! - [`Observation`] - Validated, immutable evidence for one frame
//! - [`ObservationLabel`] - The label an observation votes for during segmentation
//! - [`Normalizer`] - Enforces confidence range and strictly increasing frame order
//!
//! # Labels
//!
//! Action and object classifications are combined into a single label,
//! `"<action> <object>"`. When only one of them is present that one is used,
//! and when neither is present the observation carries [`ObservationLabel::Unknown`],
//! which segments like any other label.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Axis-aligned rectangle in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Observation exactly as received, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub frame_index: u64,
    /// Seconds since the start of the stream
    pub timestamp: f64,
    #[serde(default)]
    pub action_label: Option<String>,
    #[serde(default)]
    pub object_label: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub bounding_region: Option<BoundingRegion>,
}

impl RawObservation {
    /// Create a raw observation carrying only an action label
    pub fn action(frame_index: u64, timestamp: f64, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            action_label: Some(label.into()),
            object_label: None,
            confidence,
            bounding_region: None,
        }
    }

    /// Create a raw observation with no classification at all
    pub fn unlabeled(frame_index: u64, timestamp: f64, confidence: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            action_label: None,
            object_label: None,
            confidence,
            bounding_region: None,
        }
    }

    pub fn with_object(mut self, label: impl Into<String>) -> Self {
        self.object_label = Some(label.into());
        self
    }

    pub fn with_region(mut self, region: BoundingRegion) -> Self {
        self.bounding_region = Some(region);
        self
    }
}

/// Label an observation contributes to segmentation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationLabel {
    Known(String),
    Unknown,
}

impl ObservationLabel {
    /// Combine optional action and object classifications into one label
    pub fn combine(action: Option<&str>, object: Option<&str>) -> Self {
        let action = action.map(str::trim).filter(|s| !s.is_empty());
        let object = object.map(str::trim).filter(|s| !s.is_empty());
        match (action, object) {
            (Some(a), Some(o)) => ObservationLabel::Known(format!("{} {}", a, o)),
            (Some(a), None) => ObservationLabel::Known(a.to_string()),
            (None, Some(o)) => ObservationLabel::Known(o.to_string()),
            (None, None) => ObservationLabel::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ObservationLabel::Unknown)
    }

    /// Label text; `"unknown"` for observations without classification
    pub fn as_str(&self) -> &str {
        match self {
            ObservationLabel::Known(label) => label,
            ObservationLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObservationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated evidence for a single frame
///
/// Deserializing goes through [`RawObservation`] and the same range and
/// timestamp checks as [`Normalizer`]; frame order cannot be checked there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawObservation")]
pub struct Observation {
    frame_index: u64,
    timestamp: f64,
    action_label: Option<String>,
    object_label: Option<String>,
    confidence: f64,
    bounding_region: Option<BoundingRegion>,
    label: ObservationLabel,
}

impl Observation {
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn action_label(&self) -> Option<&str> {
        self.action_label.as_deref()
    }

    pub fn object_label(&self) -> Option<&str> {
        self.object_label.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bounding_region(&self) -> Option<&BoundingRegion> {
        self.bounding_region.as_ref()
    }

    pub fn label(&self) -> &ObservationLabel {
        &self.label
    }
}

impl TryFrom<RawObservation> for Observation {
    type Error = ObservationError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        check(raw, None)
    }
}

/// Reasons an observation is refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("confidence {confidence} of frame {frame_index} is outside [0, 1]")]
    ConfidenceOutOfRange { frame_index: u64, confidence: f64 },

    #[error("frame {frame_index} does not follow frame {previous}")]
    NonMonotonicFrame { frame_index: u64, previous: u64 },

    #[error("timestamp of frame {frame_index} is not a finite number")]
    InvalidTimestamp { frame_index: u64 },
}

/// Validates raw observations for one session
///
/// Remembers the last admitted frame index so ordering is enforced across
/// successive windows of the same session.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    last_frame: Option<u64>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame index of the most recently admitted observation
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Validate one observation and admit it
    pub fn normalize(&mut self, raw: RawObservation) -> Result<Observation, ObservationError> {
        let observation = check(raw, self.last_frame)?;
        self.last_frame = Some(observation.frame_index);
        Ok(observation)
    }

    /// Validate a whole window
    ///
    /// Either every observation is admitted or none is: on failure the
    /// normalizer keeps its previous state.
    pub fn normalize_all(
        &mut self,
        raw: impl IntoIterator<Item = RawObservation>,
    ) -> Result<Vec<Observation>, ObservationError> {
        let mut last = self.last_frame;
        let mut admitted = Vec::new();
        for item in raw {
            let observation = check(item, last)?;
            last = Some(observation.frame_index);
            admitted.push(observation);
        }
        self.last_frame = last;
        Ok(admitted)
    }
}

fn check(raw: RawObservation, last_frame: Option<u64>) -> Result<Observation, ObservationError> {
    // NaN fails the range check as well
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(ObservationError::ConfidenceOutOfRange {
            frame_index: raw.frame_index,
            confidence: raw.confidence,
        });
    }
    if let Some(previous) = last_frame {
        if raw.frame_index <= previous {
            return Err(ObservationError::NonMonotonicFrame {
                frame_index: raw.frame_index,
                previous,
            });
        }
    }
    if !raw.timestamp.is_finite() {
        return Err(ObservationError::InvalidTimestamp {
            frame_index: raw.frame_index,
        });
    }

    let label = ObservationLabel::combine(raw.action_label.as_deref(), raw.object_label.as_deref());
    Ok(Observation {
        frame_index: raw.frame_index,
        timestamp: raw.timestamp,
        action_label: raw.action_label,
        object_label: raw.object_label,
        confidence: raw.confidence,
        bounding_region: raw.bounding_region,
        label,
    })
}
