//! Preset validation errors.

use thiserror::Error;

/// Structural problems found while loading a preset definition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PresetError {
    #[error("preset '{0}' has no nodes")]
    Empty(String),

    #[error("preset '{preset}' defines node '{node}' more than once")]
    DuplicateNode { preset: String, node: String },

    #[error("preset '{preset}' starts at unknown node '{node}'")]
    UnknownStartNode { preset: String, node: String },

    #[error("node '{from}' in preset '{preset}' allows unknown successor '{to}'")]
    UnknownSuccessor {
        preset: String,
        from: String,
        to: String,
    },

    #[error("label '{label}' in preset '{preset}' maps to unknown node '{node}'")]
    UnknownLabelTarget {
        preset: String,
        label: String,
        node: String,
    },

    #[error("fallback label '{label}' of preset '{preset}' resolves to no node")]
    UnresolvedFallback { preset: String, label: String },

    #[error("alias '{alias}' in preset '{preset}' is claimed by both '{first}' and '{second}'")]
    AmbiguousAlias {
        preset: String,
        alias: String,
        first: String,
        second: String,
    },

    #[error("node '{node}' in preset '{preset}' has an invalid dwell budget: {reason}")]
    InvalidBudget {
        preset: String,
        node: String,
        reason: String,
    },

    #[error("preset '{0}' is registered more than once")]
    DuplicatePreset(String),
}

pub type PresetResult<T> = std::result::Result<T, PresetError>;
