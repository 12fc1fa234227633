//! Append-only audit trail kept as a single text object in Cloud Storage.
//!
//! Many function instances append to the same object concurrently. Every
//! append is a read-modify-write guarded by the generation that was read, so
//! a concurrent writer makes the upload fail with `PreconditionFailed` and the
//! attempt is retried against the newer contents. A missing object is written
//! with generation `0`, which only succeeds if nobody created it first.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use intake_gcp::{ObjectStore, Precondition};
use intake_models::{AuditConfig, IntakeError};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[2024-05-01 12:00:00 UTC] [INFO]: message` followed by a newline.
pub fn format_entry(timestamp: DateTime<Utc>, severity: Severity, message: &str) -> String {
    format!(
        "[{}] [{}]: {}\n",
        timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        severity,
        message
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    pub attempts: u32,
}

impl AppendReport {
    /// Attempts lost to concurrent writers.
    pub fn conflicts(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

pub struct AuditLog {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    object: String,
    max_retries: u32,
    backoff: Duration,
}

impl AuditLog {
    pub fn new(store: Arc<dyn ObjectStore>, config: &AuditConfig) -> Self {
        Self {
            store,
            bucket: config.bucket.clone(),
            object: config.object.clone(),
            max_retries: config.max_retries.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub async fn info(&self, message: &str) -> Result<AppendReport, IntakeError> {
        self.append(Severity::Info, message).await
    }

    pub async fn error(&self, message: &str) -> Result<AppendReport, IntakeError> {
        self.append(Severity::Error, message).await
    }

    pub async fn append(&self, severity: Severity, message: &str) -> Result<AppendReport, IntakeError> {
        let entry = format_entry(Utc::now(), severity, message);

        for attempt in 1..=self.max_retries {
            match self.try_append(&entry).await {
                Ok(()) => {
                    info!(
                        bucket = %self.bucket,
                        object = %self.object,
                        attempt,
                        "Appended audit entry"
                    );
                    return Ok(AppendReport { attempts: attempt });
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, error = %e, "Audit log changed underneath us, retrying");
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.delay_for(attempt)).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Unexpected error while appending to audit log");
                    return Err(e);
                }
            }
        }

        error!(
            attempts = self.max_retries,
            "Failed to append audit entry after repeated concurrent writes"
        );
        Err(IntakeError::AuditContention {
            attempts: self.max_retries,
        })
    }

    async fn try_append(&self, entry: &str) -> Result<(), IntakeError> {
        let (current, generation) = match self.store.read(&self.bucket, &self.object).await? {
            Some(existing) => (existing.data, existing.generation),
            None => (Default::default(), 0),
        };

        let mut body = BytesMut::with_capacity(current.len() + entry.len());
        body.put_slice(&current);
        body.put_slice(entry.as_bytes());

        self.store
            .write(
                &self.bucket,
                &self.object,
                body.freeze(),
                "text/plain",
                Precondition::IfGenerationMatch(generation),
            )
            .await
            .map(|_| ())
    }

    // Linear backoff with up to 25% jitter so contending writers spread out.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff * attempt;
        let jitter_ceiling = (base.as_millis() as u64) / 4;
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        };
        base + Duration::from_millis(jitter)
    }
}
