use async_trait::async_trait;
use intake_gcp::SpeechRecognizer;
use intake_models::IntakeError;
use intake_validation::{MediaProbe, ProbeOutput};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum ProbeBehavior {
    Output(ProbeOutput),
    Fail(String),
}

/// Media probe with a canned answer that records the paths it was asked about.
#[derive(Clone)]
pub struct FakeProbe {
    behavior: ProbeBehavior,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self::with_output(ProbeOutput {
            success: true,
            stderr: String::new(),
        })
    }

    pub fn with_output(output: ProbeOutput) -> Self {
        Self {
            behavior: ProbeBehavior::Output(output),
            calls: Arc::default(),
        }
    }

    /// Every probe errors as if the binary could not be run.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            behavior: ProbeBehavior::Fail(reason.into()),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, IntakeError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        match &self.behavior {
            ProbeBehavior::Output(output) => Ok(output.clone()),
            ProbeBehavior::Fail(reason) => Err(IntakeError::ProbeFailed {
                reason: reason.clone(),
            }),
        }
    }
}

/// Speech recognizer answering from a table keyed by `gs://` URI. Unknown
/// URIs transcribe to an empty string.
#[derive(Clone, Default)]
pub struct FakeSpeech {
    transcripts: Arc<Mutex<HashMap<String, String>>>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_transcript(self, gcs_uri: &str, transcript: &str) -> Self {
        self.transcripts
            .lock()
            .unwrap()
            .insert(gcs_uri.to_string(), transcript.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechRecognizer for FakeSpeech {
    async fn transcribe(&self, gcs_uri: &str) -> Result<String, IntakeError> {
        self.calls.lock().unwrap().push(gcs_uri.to_string());
        if let Some(message) = &self.failure {
            return Err(IntakeError::SpeechError {
                message: message.clone(),
            });
        }
        Ok(self
            .transcripts
            .lock()
            .unwrap()
            .get(gcs_uri)
            .cloned()
            .unwrap_or_default())
    }
}
