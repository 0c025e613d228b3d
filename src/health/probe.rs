//! Process-listing probes.
//!
//! [`CommandProbe`] runs an external process-listing command (by default
//! `pgrep -f <pattern>`) and hands its stdout back to the monitor.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Errors raised when the probe itself cannot run.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The listing command could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command's output could not be read.
    #[error("failed to read probe output: {0}")]
    Read(String),
}

/// Lists processes matching a pattern.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Return the raw listing output for `pattern`.
    ///
    /// An empty string means nothing matched.
    async fn list(&self, pattern: &str) -> Result<String, ProbeError>;
}

/// Probe backed by an external command.
///
/// The pattern is appended as the last argument. A non-zero exit status is
/// not an error: `pgrep` exits 1 when nothing matches, which shows up here
/// as empty output.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    /// `pgrep -f <pattern>`.
    pub fn pgrep() -> Self {
        Self::new("pgrep").arg("-f")
    }

    /// Probe running `program` with the pattern as its final argument.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument placed before the pattern.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the leading arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandProbe {
    fn default() -> Self {
        Self::pgrep()
    }
}

#[async_trait]
impl ProcessProbe for CommandProbe {
    async fn list(&self, pattern: &str) -> Result<String, ProbeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(pattern);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|source| ProbeError::Launch {
            program: self.program.clone(),
            source,
        })?;

        String::from_utf8(output.stdout).map_err(|e| ProbeError::Read(e.to_string()))
    }
}

/// First non-blank line of probe output, trimmed.
pub(crate) fn first_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| !line.is_empty())
}
