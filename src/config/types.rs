//! Configuration types deserialized from the sidecar YAML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::timer::{Timer, TimerError};
use crate::health::{CommandProbe, HealthMonitor};
use crate::membership::{
    AutoScalingGroup, CloudProvider, InMemoryCloud, MembershipSettings, SecurityGroup,
};
use crate::scheduler::OverlapPolicy;

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_true() -> bool {
    true
}

/// Top-level sidecar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    /// Pattern matched against running processes.
    pub process_name: String,
    /// Autoscaling group of this node's ring.
    pub ring_name: String,
    /// This node's rac.
    #[serde(default)]
    pub rac: Option<String>,
    /// Every rac the cluster spans.
    #[serde(default)]
    pub racs: Vec<String>,
    /// Security group holding the ring's ingress rules.
    pub acl_group_name: String,
    /// Data-center region.
    pub dc: String,
    /// Default timezone for cron timers.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub health: HealthConfig,
    /// Ring audit; disabled when absent.
    #[serde(default)]
    pub audit: Option<AuditConfig>,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
}

impl SidecarConfig {
    /// Ring identity for the membership coordinator.
    pub fn membership_settings(&self) -> MembershipSettings {
        let settings = MembershipSettings::new(&self.ring_name, &self.acl_group_name, &self.dc)
            .with_racs(self.racs.iter().cloned());
        match &self.rac {
            Some(rac) => settings.with_rac(rac),
            None => settings,
        }
    }

    /// Timer for the health monitor.
    pub fn health_timer(&self) -> Result<Timer, TimerError> {
        self.health.timer.build(&self.timezone)
    }

    /// Timer for the ring audit, if enabled.
    pub fn audit_timer(&self) -> Option<Result<Timer, TimerError>> {
        self.audit
            .as_ref()
            .map(|audit| audit.timer.build(&self.timezone))
    }

    /// Process probe for the health monitor.
    pub fn probe(&self) -> CommandProbe {
        match &self.health.probe_program {
            Some(program) => CommandProbe::new(program).arg("-f"),
            None => CommandProbe::pgrep(),
        }
    }
}

/// Timer section: either `interval_ms` or `cron` with optional timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimerConfig {
    Interval {
        interval_ms: u64,
    },
    Cron {
        cron: String,
        timezone: Option<String>,
    },
}

impl TimerConfig {
    /// Build the timer, using `default_timezone` for cron timers without one.
    pub fn build(&self, default_timezone: &str) -> Result<Timer, TimerError> {
        match self {
            TimerConfig::Interval { interval_ms } => Timer::every_millis(*interval_ms),
            TimerConfig::Cron { cron, timezone } => Timer::cron_with_timezone(
                cron.clone(),
                timezone.as_deref().unwrap_or(default_timezone),
            ),
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "HealthConfig::default_timer")]
    pub timer: TimerConfig,
    /// Program used instead of `pgrep`; called as `<program> -f <pattern>`.
    #[serde(default)]
    pub probe_program: Option<String>,
}

impl HealthConfig {
    fn default_timer() -> TimerConfig {
        TimerConfig::Interval {
            interval_ms: HealthMonitor::DEFAULT_INTERVAL.as_millis() as u64,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timer: Self::default_timer(),
            probe_program: None,
        }
    }
}

/// Ring audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub timer: TimerConfig,
}

/// Backup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Manifest directory; the OS temp dir when unset.
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
}

impl BackupConfig {
    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub overlap: OverlapPolicy,
    pub shutdown_timeout_secs: u64,
    pub tick_ms: u64,
}

impl SchedulerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overlap: OverlapPolicy::Skip,
            shutdown_timeout_secs: 30,
            tick_ms: 250,
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "ApiConfig::default_host")]
    pub host: String,
    #[serde(default = "ApiConfig::default_port")]
    pub port: u16,
}

impl ApiConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8575
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// Cloud provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CloudConfig {
    /// In-memory provider seeded with fixed groups.
    #[serde(rename = "memory")]
    Memory {
        #[serde(default)]
        groups: Vec<AutoScalingGroup>,
        #[serde(default)]
        security_groups: Vec<SecurityGroup>,
    },
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig::Memory {
            groups: Vec::new(),
            security_groups: Vec::new(),
        }
    }
}

impl CloudConfig {
    /// Build the configured provider.
    pub fn provider(&self) -> Arc<dyn CloudProvider> {
        match self {
            CloudConfig::Memory {
                groups,
                security_groups,
            } => Arc::new(InMemoryCloud::from_parts(
                groups.clone(),
                security_groups.clone(),
            )),
        }
    }
}
