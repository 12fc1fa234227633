use crate::function::CloudEventFunction;
use async_trait::async_trait;
use bytes::Bytes;
use intake_audit::{AuditLog, Severity};
use intake_gcp::{download_to_path, ObjectStore, Precondition, SpeechRecognizer};
use intake_metrics::{MetricsService, TracingService};
use intake_models::{CloudEvent, Config, IntakeError, ObjectRef, OBJECT_FINALIZED};
use intake_validation::FileValidator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};

pub const ANALYZE_DISCOVERY_MATERIAL: &str = "analyze_discovery_material_ce";

/// Written instead of an empty transcript so the output object always exists.
pub const NO_TRANSCRIPT_PLACEHOLDER: &str = "[No transcription available]";

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub output_bucket: String,
    pub audio_extensions: Vec<String>,
    pub scratch_dir: Option<PathBuf>,
}

impl AnalyzerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_bucket: config.storage.output_bucket.clone(),
            audio_extensions: config.speech.audio_extensions.clone(),
            scratch_dir: config.storage.scratch_dir.as_ref().map(PathBuf::from),
        }
    }

    fn is_audio(&self, ext: &str) -> bool {
        self.audio_extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored { reason: String },
    RejectedAtRoot,
    Rejected { message: String },
    /// `transcript` names the object written to the output bucket, if any.
    Accepted { transcript: Option<String> },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Ignored { .. } => "ignored",
            Outcome::RejectedAtRoot => "rejected_at_root",
            Outcome::Rejected { .. } => "rejected",
            Outcome::Accepted { .. } => "accepted",
        }
    }
}

/// Screens new uploads to the discovery bucket: root uploads and corrupt or
/// unsupported files are deleted, audio gets transcribed, and every deletion
/// or transcription is written to the shared audit log.
pub struct DiscoveryAnalyzer {
    store: Arc<dyn ObjectStore>,
    speech: Arc<dyn SpeechRecognizer>,
    validator: Arc<FileValidator>,
    audit: Arc<AuditLog>,
    metrics: Arc<MetricsService>,
    settings: AnalyzerSettings,
}

impl DiscoveryAnalyzer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        speech: Arc<dyn SpeechRecognizer>,
        validator: Arc<FileValidator>,
        audit: Arc<AuditLog>,
        metrics: Arc<MetricsService>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            store,
            speech,
            validator,
            audit,
            metrics,
            settings,
        }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn analyze(&self, event: &CloudEvent) -> Result<Outcome, IntakeError> {
        if event.event_type != OBJECT_FINALIZED {
            info!("Ignoring event type that is not an object finalize");
            return Ok(Outcome::Ignored {
                reason: format!("event type {}", event.event_type),
            });
        }

        let object = event.storage_object()?.object_ref();
        TracingService::log_event_received(&event.id, &event.event_type, &object.bucket, &object.name);

        if object.is_folder_placeholder() {
            return Ok(Outcome::Ignored {
                reason: "folder placeholder".to_string(),
            });
        }
        if object.bucket == self.audit.bucket() && object.name == self.audit.object() {
            return Ok(Outcome::Ignored {
                reason: "audit log object".to_string(),
            });
        }

        if object.is_at_bucket_root() {
            self.reject_root_upload(&object).await?;
            return Ok(Outcome::RejectedAtRoot);
        }
        info!(object = %object.name, "File is inside a folder, continuing");

        match self.validate_upload(&object).await {
            Ok(Some(message)) => return Ok(Outcome::Rejected { message }),
            Ok(None) => {}
            Err(IntakeError::ObjectNotFound { .. }) => {
                // redelivered after an earlier delivery deleted it
                info!(object = %object.name, "Object already removed, nothing to analyze");
                return Ok(Outcome::Ignored {
                    reason: "object no longer exists".to_string(),
                });
            }
            Err(e) => error!(object = %object.name, error = %e, "Error validating file"),
        }

        let transcript = self.speech_to_text(&object).await;
        Ok(Outcome::Accepted { transcript })
    }

    async fn reject_root_upload(&self, object: &ObjectRef) -> Result<(), IntakeError> {
        info!(object = %object.name, "File uploaded at bucket root, not allowed");
        match self.store.delete(&object.bucket, &object.name).await {
            Ok(()) => {}
            Err(IntakeError::ObjectNotFound { .. }) => {
                // redelivered event; the first delivery already removed it
                info!(object = %object.name, "Root upload already removed");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.metrics.record_object_deleted();
        TracingService::log_object_deleted(&object.bucket, &object.name, "uploaded at bucket root");
        self.audit_line(
            Severity::Info,
            &format!(
                "Deleted disallowed file {} (no files allowed at bucket root)",
                object.name
            ),
        )
        .await;
        Ok(())
    }

    /// Returns the rejection message when the upload was deleted.
    async fn validate_upload(&self, object: &ObjectRef) -> Result<Option<String>, IntakeError> {
        let scratch = self.scratch_dir()?;
        // fixed local name; object names may contain path tricks
        let local = scratch.path().join(format!("upload{}", object.extension()));

        let bytes = download_to_path(self.store.as_ref(), &object.bucket, &object.name, &local).await?;
        info!(object = %object.name, bytes, "Downloaded for validation");

        let verdict = self.validator.validate(&local, &object.name).await?;
        if verdict.valid {
            info!(object = %object.name, message = %verdict.message, "File passed validation");
            return Ok(None);
        }

        warn!(object = %object.name, message = %verdict.message, "File failed validation");
        self.store.delete(&object.bucket, &object.name).await?;
        self.metrics.record_object_deleted();
        TracingService::log_object_deleted(&object.bucket, &object.name, &verdict.message);
        self.audit_line(
            Severity::Error,
            &format!(
                "Deleted corrupted or invalid file {}: {}",
                object.name, verdict.message
            ),
        )
        .await;
        Ok(Some(verdict.message))
    }

    /// Transcribes supported audio and returns the transcript object name.
    async fn speech_to_text(&self, object: &ObjectRef) -> Option<String> {
        let ext = object.extension();
        if !self.settings.is_audio(&ext) {
            info!("Skipping speech-to-text: unsupported file type '{}'", ext);
            return None;
        }

        let source_uri = object.gs_uri();
        info!(source = %source_uri, "Transcribing via Speech-to-Text v2");
        match self.transcribe_and_store(object, &source_uri).await {
            Ok(name) => {
                self.metrics.record_transcription(true);
                self.audit_line(
                    Severity::Info,
                    &format!(
                        "Transcribed {} → gs://{}/{}",
                        source_uri, self.settings.output_bucket, name
                    ),
                )
                .await;
                Some(name)
            }
            Err(e) => {
                error!(source = %source_uri, error = %e, "Speech-to-text failed");
                self.metrics.record_transcription(false);
                self.audit_line(
                    Severity::Error,
                    &format!("Speech-to-text failed for {}: {}", source_uri, e),
                )
                .await;
                None
            }
        }
    }

    async fn transcribe_and_store(&self, object: &ObjectRef, source_uri: &str) -> Result<String, IntakeError> {
        let mut transcript = self.speech.transcribe(source_uri).await?;
        if transcript.is_empty() {
            transcript = NO_TRANSCRIPT_PLACEHOLDER.to_string();
        }

        let name = object.transcript_name();
        let chars = transcript.chars().count();
        self.store
            .write(
                &self.settings.output_bucket,
                &name,
                Bytes::from(transcript),
                "text/plain",
                Precondition::None,
            )
            .await?;
        TracingService::log_transcript_written(
            source_uri,
            &format!("gs://{}/{}", self.settings.output_bucket, name),
            chars,
        );
        Ok(name)
    }

    // Audit failures are logged and counted but never fail the event.
    async fn audit_line(&self, severity: Severity, message: &str) {
        match self.audit.append(severity, message).await {
            Ok(report) => self.metrics.record_audit_conflicts(report.conflicts()),
            Err(e) => {
                warn!(error = %e, "Audit entry dropped");
                self.metrics.record_audit_failure();
            }
        }
    }

    fn scratch_dir(&self) -> Result<TempDir, IntakeError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("intake-");
        let dir = match &self.settings.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

#[async_trait]
impl CloudEventFunction for DiscoveryAnalyzer {
    fn name(&self) -> &str {
        ANALYZE_DISCOVERY_MATERIAL
    }

    async fn call(&self, event: CloudEvent) -> Result<(), IntakeError> {
        let started = Instant::now();
        self.metrics.record_event();

        let result = self.analyze(&event).await;

        self.metrics.record_duration(started.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(outcome) => {
                info!(event_id = %event.id, outcome = outcome.label(), "Event handled");
                self.metrics.record_outcome(outcome.label());
            }
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Event handling failed");
                self.metrics.record_outcome("error");
            }
        }
        result.map(|_| ())
    }
}
