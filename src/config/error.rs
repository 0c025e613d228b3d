//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::timer::TimerError;

/// Errors that can occur when loading the sidecar configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A required string is empty or blank.
    #[error("'{0}' must not be empty")]
    EmptyField(&'static str),

    /// No racs configured.
    #[error("racs must list at least one rac")]
    NoRacs,

    /// The node's rac is not among the configured racs.
    #[error("rac '{rac}' is not one of the configured racs {racs:?}")]
    UnknownRac { rac: String, racs: Vec<String> },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// A timer section does not describe a valid timer.
    #[error("invalid timer for '{section}': {source}")]
    InvalidTimer {
        section: &'static str,
        #[source]
        source: TimerError,
    },

    /// A duration setting that must be positive is zero.
    #[error("'{0}' cannot be zero")]
    ZeroDuration(&'static str),
}
