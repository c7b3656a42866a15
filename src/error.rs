//! Error handling for the ActSeq engine
//!
//! This module defines the crate-wide error type and a Result alias. Subsystems
//! with their own failure modes (observation normalization, preset validation)
//! keep a dedicated error enum that folds into [`ActSeqError`].
//!
//! Unmapped labels, rejected transitions and exhausted quotas are not errors:
//! they are recorded in the session log and reflected in the session status.

use thiserror::Error;

use crate::observation::ObservationError;
use crate::preset::PresetError;
use crate::session::SessionId;

/// Main error type for ActSeq operations
#[derive(Error, Debug)]
pub enum ActSeqError {
    /// An observation failed validation and was not admitted
    #[error("Malformed observation: {0}")]
    MalformedObservation(#[from] ObservationError),

    /// A preset definition failed structural validation
    #[error("Invalid preset: {0}")]
    InvalidPreset(#[from] PresetError),

    /// No preset with this id is registered
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// No session with this id exists in the table
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// A segmentation result was handed to a session that did not produce it
    #[error("Segmentation result belongs to {found}, not {expected}")]
    SessionMismatch {
        expected: SessionId,
        found: SessionId,
    },

    /// The session reached a terminal status and accepts no more segments
    #[error("Session {0} has already finished")]
    SessionFinished(SessionId),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication with pool workers
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ActSeqError>,
    },
}

impl ActSeqError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ActSeqError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &ActSeqError {
        match self {
            ActSeqError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for ActSeqError {
    fn from(err: serde_json::Error) -> Self {
        ActSeqError::Serialization(err.to_string())
    }
}

/// Result type alias for ActSeq operations
pub type Result<T> = std::result::Result<T, ActSeqError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ActSeqError::UnknownPreset("assembly".to_string());
        assert_eq!(err.to_string(), "Unknown preset: assembly");
    }

    #[test]
    fn test_error_with_context() {
        let err = ActSeqError::Config("bad penalty".to_string());
        let with_ctx = err.with_context("Failed to load engine config");
        assert!(with_ctx.to_string().contains("Failed to load engine config"));
        assert!(matches!(with_ctx.root(), ActSeqError::Config(_)));
    }

    #[test]
    fn test_session_mismatch_display() {
        let err = ActSeqError::SessionMismatch {
            expected: SessionId(1),
            found: SessionId(2),
        };
        assert_eq!(
            err.to_string(),
            "Segmentation result belongs to Session#2, not Session#1"
        );
    }

    #[test]
    fn test_observation_error_converts() {
        let err: ActSeqError = ObservationError::ConfidenceOutOfRange {
            frame_index: 3,
            confidence: 1.5,
        }
        .into();
        assert!(matches!(err, ActSeqError::MalformedObservation(_)));
        assert!(err.to_string().contains("frame 3"));
    }
}
