use async_trait::async_trait;
use intake_models::{IntakeError, ValidationConfig};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Result of running a media inspector over a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutput {
    pub success: bool,
    pub stderr: String,
}

#[async_trait]
pub trait MediaProbe: Send + Sync + 'static {
    /// Errors mean the probe itself could not run; a corrupt file is a
    /// successful probe with `success == false` or non-empty stderr.
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, IntakeError>;
}

/// Runs `ffprobe -v error -i <path>`, which prints nothing for healthy files.
pub struct FfprobeProbe {
    program: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(
            &config.ffprobe_path,
            Duration::from_secs(config.probe_timeout_secs),
        )
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    #[instrument(skip(self), fields(program = %self.program.display()))]
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, IntakeError> {
        let mut command = Command::new(&self.program);
        command
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| IntakeError::ProbeTimeout {
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| IntakeError::ProbeFailed {
                reason: format!("could not run {}: {}", self.program.display(), e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(status = ?output.status, stderr_len = stderr.len(), "ffprobe finished");
        Ok(ProbeOutput {
            success: output.status.success(),
            stderr,
        })
    }
}
