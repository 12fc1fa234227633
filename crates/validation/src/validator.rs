use crate::documents;
use crate::kind::FileKind;
use crate::probe::{FfprobeProbe, MediaProbe};
use intake_models::{file_extension, IntakeError, ValidationConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of an integrity check. Invalid files get deleted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub valid: bool,
    pub kind: FileKind,
    pub message: String,
}

impl Verdict {
    pub fn valid(kind: FileKind, message: impl Into<String>) -> Self {
        Self {
            valid: true,
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(kind: FileKind, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            kind,
            message: message.into(),
        }
    }
}

pub struct FileValidator {
    probe: Arc<dyn MediaProbe>,
    reject_unsupported: bool,
}

impl FileValidator {
    pub fn new(probe: Arc<dyn MediaProbe>, reject_unsupported: bool) -> Self {
        Self {
            probe,
            reject_unsupported,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(
            Arc::new(FfprobeProbe::from_config(config)),
            config.reject_unsupported,
        )
    }

    /// Checks the downloaded copy at `local_path` of the object `object_name`.
    /// Returns `Err` only when the check itself could not be carried out.
    #[instrument(skip(self, local_path))]
    pub async fn validate(&self, local_path: &Path, object_name: &str) -> Result<Verdict, IntakeError> {
        let kind = FileKind::from_extension(&file_extension(object_name));
        let verdict = match kind {
            FileKind::Media => self.validate_media(local_path, object_name).await?,
            FileKind::Image => {
                match blocking(local_path, documents::check_image).await? {
                    Ok(()) => Verdict::valid(kind, "Image file is valid."),
                    Err(e) => Verdict::invalid(kind, format!("Corrupted image file: {}", e)),
                }
            }
            FileKind::Docx => match blocking(local_path, documents::check_docx).await? {
                Ok(()) => Verdict::valid(kind, "DOCX file opened successfully."),
                Err(e) => Verdict::invalid(kind, format!("Corrupted DOCX file: {}", e)),
            },
            FileKind::Pdf => match blocking(local_path, documents::check_pdf).await? {
                Ok(_pages) => Verdict::valid(kind, "PDF file opened successfully."),
                Err(e) => Verdict::invalid(kind, format!("Corrupted or unreadable PDF: {}", e)),
            },
            FileKind::Unsupported => {
                let message = format!(
                    "Unsupported file type for {}; skipping validation.",
                    object_name
                );
                if self.reject_unsupported {
                    Verdict::invalid(kind, message)
                } else {
                    Verdict::valid(kind, message)
                }
            }
        };
        info!(kind = %verdict.kind, valid = verdict.valid, "Validation finished");
        Ok(verdict)
    }

    async fn validate_media(&self, local_path: &Path, object_name: &str) -> Result<Verdict, IntakeError> {
        if !tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            return Ok(Verdict::invalid(
                FileKind::Media,
                format!("File download failed: {} does not exist.", local_path.display()),
            ));
        }
        let output = self.probe.probe(local_path).await?;
        if !output.success || !output.stderr.is_empty() {
            let detail = if output.stderr.is_empty() {
                "Non-zero exit code".to_string()
            } else {
                output.stderr
            };
            return Ok(Verdict::invalid(
                FileKind::Media,
                format!("Invalid or corrupted media: {}, {}", object_name, detail),
            ));
        }
        Ok(Verdict::valid(
            FileKind::Media,
            format!("{} file passed integrity check.", object_name),
        ))
    }
}

async fn blocking<T, F>(path: &Path, check: F) -> Result<Result<T, String>, IntakeError>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, String> + Send + 'static,
{
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || check(&path))
        .await
        .map_err(|e| IntakeError::internal(format!("validation task failed: {}", e)))
}
