//! # ActSeq: action sequences from per-frame detections
//!
//! Turns a noisy, per-frame stream of vision detections (action and object
//! classifications with confidences) into a clean sequence of workflow
//! states, validated against a preset state graph.
//!
//! ## Architecture
//!
//! - **Observation**: validation and label combination of raw detections
//! - **Segmentation**: dynamic-programming partition of a window into labelled segments
//! - **Preset**: immutable, shared workflow graphs with O(1) transition checks
//! - **Machine**: replays segments through a preset, producing an auditable log
//! - **Quota**: transition/span ceilings and per-node dwell budgets
//! - **Session**: explicit session table and a parallel worker pool
//! - **Review**: statistics over archived logs
//!
//! Data flows `RawObservation → Observation → Segment → Transition`, one
//! session at a time, with sessions running in parallel.
//!
//! ## Example
//!
//! ```ignore
//! use actseq_rs::{
//!     preset::{NodeDefinition, PresetDefinition, PresetRegistry},
//!     quota::QuotaLimits,
//!     segmentation::Segmenter,
//!     session::SessionTable,
//! };
//!
//! let def = PresetDefinition::new("shop", "idle")
//!     .node(NodeDefinition::new("idle").allow("idle").allow("working"))
//!     .node(NodeDefinition::new("working").allow("idle"))
//!     .map_label("rest", "idle")
//!     .map_label("drill", "working");
//! let registry = PresetRegistry::from_definitions([&def]);
//!
//! let mut table = SessionTable::new(Segmenter::default());
//! let id = table.create_from_registry(&registry, "shop", QuotaLimits::unlimited())?;
//! let segments = table.ingest(id, observations)?;
//! let report = table.advance(id, &segments)?;
//! let archive = table.destroy(id)?;
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod observation;
pub mod preset;
pub mod quota;
pub mod review;
pub mod segmentation;
pub mod session;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ActSeqError, Result, ResultExt};
pub use machine::{SessionStatus, StateMachine, StateMachineLog};
pub use observation::{Observation, RawObservation};
pub use preset::{Preset, PresetDefinition, PresetRegistry};
pub use quota::{QuotaLimits, QuotaStatus};
pub use segmentation::{CostModel, Segment, SegmentationResult, Segmenter};
pub use session::{SessionId, SessionPool, SessionTable};
