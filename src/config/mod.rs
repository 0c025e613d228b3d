//! Configuration loading and parsing.
//!
//! This module provides the YAML configuration for the sidecar.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{
    ApiConfig, AuditConfig, BackupConfig, CloudConfig, HealthConfig, SchedulerConfig,
    SidecarConfig, TimerConfig,
};
pub use yaml::YamlLoader;
