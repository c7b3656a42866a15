//! Section types of the engine configuration file
//!
//! The segmentation section is a [`CostModel`](crate::segmentation::CostModel)
//! and the quota section a [`QuotaLimits`](crate::quota::QuotaLimits); the
//! remaining sections only matter to the binary and the worker pool.
//!
//! # Main Types
//!
//! - [`LoggingSettings`] - Log filter and optional rolling log directory
//! - [`PoolSettings`] - Worker thread count for parallel sessions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,actseq_rs=debug";

/// Default number of pool workers
pub const DEFAULT_WORKERS: usize = 4;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Write daily-rolling log files here in addition to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// File name prefix of rolling log files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_file_prefix() -> String {
    "actseq.log".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.filter, DEFAULT_LOG_FILTER);
        assert!(logging.directory.is_none());
        assert_eq!(PoolSettings::default().workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_partial_sections() {
        let logging: LoggingSettings = toml::from_str("directory = \"/tmp/logs\"").unwrap();
        assert_eq!(logging.filter, DEFAULT_LOG_FILTER);
        assert_eq!(logging.directory, Some(PathBuf::from("/tmp/logs")));
    }
}
