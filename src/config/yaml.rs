//! YAML configuration parsing.
//!
//! Parses the sidecar configuration file and validates it.

use std::path::Path;

use super::error::ConfigError;
use super::types::SidecarConfig;

/// Loader for the sidecar YAML file.
pub struct YamlLoader;

impl YamlLoader {
    /// Load and validate configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<SidecarConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<SidecarConfig, ConfigError> {
        let config: SidecarConfig = serde_yaml::from_str(yaml)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a parsed configuration.
    fn validate(config: &SidecarConfig) -> Result<(), ConfigError> {
        let required = [
            ("process_name", &config.process_name),
            ("ring_name", &config.ring_name),
            ("acl_group_name", &config.acl_group_name),
            ("dc", &config.dc),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::EmptyField(field));
        }

        if config.racs.is_empty() {
            return Err(ConfigError::NoRacs);
        }
        match &config.rac {
            Some(rac) if !config.racs.contains(rac) => {
                return Err(ConfigError::UnknownRac {
                    rac: rac.clone(),
                    racs: config.racs.clone(),
                });
            }
            _ => {}
        }

        if config.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::UnknownTimezone(config.timezone.clone()));
        }

        config
            .health_timer()
            .map_err(|source| ConfigError::InvalidTimer {
                section: "health",
                source,
            })?;
        if let Some(timer) = config.audit_timer() {
            timer.map_err(|source| ConfigError::InvalidTimer {
                section: "audit",
                source,
            })?;
        }

        if config.scheduler.shutdown_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("scheduler.shutdown_timeout_secs"));
        }
        if config.scheduler.tick_ms == 0 {
            return Err(ConfigError::ZeroDuration("scheduler.tick_ms"));
        }

        if config.api.enabled && config.api.host.trim().is_empty() {
            return Err(ConfigError::EmptyField("api.host"));
        }

        Ok(())
    }
}
