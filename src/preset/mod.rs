//! Preset graphs
//!
//! A preset is a named workflow: a set of states (nodes), the transitions
//! allowed between them, the mapping from segment labels to nodes and an
//! optional dwell budget per node.
//!
//! # Main Types
//!
//! - [`PresetDefinition`] - Serializable, unvalidated form found in configuration
//! - [`Preset`] - Validated arena of [`Node`]s with O(1) transition checks
//! - [`PresetRegistry`] - Startup-populated table of shared `Arc<Preset>`s
//!
//! Presets are immutable once loaded. Sessions hold an `Arc<Preset>` and track
//! only the [`NodeIndex`] of their current node.

pub mod definition;
pub mod error;
pub mod graph;
pub mod id;
pub mod registry;

pub use definition::{BudgetDefinition, NodeDefinition, PresetDefinition};
pub use error::{PresetError, PresetResult};
pub use graph::{DwellBudget, Node, Preset, BUDGET_LOWER_RATIO, BUDGET_UPPER_RATIO};
pub use id::NodeIndex;
pub use registry::PresetRegistry;
