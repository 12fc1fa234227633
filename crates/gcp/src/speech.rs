use crate::auth::AccessTokens;
use async_trait::async_trait;
use intake_models::{GcpConfig, IntakeError, SpeechConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Transcribes audio already stored in Cloud Storage.
    async fn transcribe(&self, gcs_uri: &str) -> Result<String, IntakeError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeRequest {
    pub config: RecognitionConfig,
    pub uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub auto_decoding_config: AutoDecodingConfig,
    pub language_codes: Vec<String>,
    pub features: RecognitionFeatures,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct AutoDecodingConfig {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionFeatures {
    pub enable_automatic_punctuation: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<SpeechResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeechResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeechAlternative {
    #[serde(default)]
    pub transcript: String,
}

impl RecognizeResponse {
    /// Top alternative of every result, one per line.
    pub fn transcript(&self) -> String {
        self.results
            .iter()
            .filter_map(|result| result.alternatives.first())
            .map(|alt| alt.transcript.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Speech-to-Text v2 `recognize` over REST.
pub struct SpeechV2Client {
    http: Client,
    tokens: Arc<AccessTokens>,
    endpoint: String,
    recognizer: String,
    settings: SpeechConfig,
}

impl SpeechV2Client {
    pub fn new(
        http: Client,
        tokens: Arc<AccessTokens>,
        gcp: &GcpConfig,
        settings: &SpeechConfig,
    ) -> Result<Self, IntakeError> {
        let project = gcp.project_id.as_deref().ok_or_else(|| IntakeError::ConfigError {
            reason: "gcp.project_id (or GCP_PROJECT) is required for speech-to-text".to_string(),
        })?;
        Ok(Self {
            http,
            tokens,
            endpoint: gcp.speech_endpoint().trim_end_matches('/').to_string(),
            recognizer: settings.recognizer_path(project, &gcp.region),
            settings: settings.clone(),
        })
    }

    pub fn recognize_url(&self) -> String {
        format!("{}/v2/{}:recognize", self.endpoint, self.recognizer)
    }

    pub fn request_for(&self, gcs_uri: &str) -> RecognizeRequest {
        RecognizeRequest {
            config: RecognitionConfig {
                auto_decoding_config: AutoDecodingConfig {},
                language_codes: self.settings.language_codes.clone(),
                features: RecognitionFeatures {
                    enable_automatic_punctuation: self.settings.enable_automatic_punctuation,
                },
                model: self.settings.model.clone(),
            },
            uri: gcs_uri.to_string(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechV2Client {
    #[instrument(skip(self))]
    async fn transcribe(&self, gcs_uri: &str) -> Result<String, IntakeError> {
        let speech_err = |message: String| IntakeError::SpeechError { message };

        let request = self
            .http
            .post(self.recognize_url())
            .json(&self.request_for(gcs_uri));
        let response = self
            .tokens
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| speech_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(speech_err(format!("recognize returned {}: {}", status, body.trim())));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| speech_err(format!("malformed recognize response: {}", e)))?;
        info!(results = parsed.results.len(), "Recognition finished");
        Ok(parsed.transcript())
    }
}

/// Stand-in used when no project is configured; every call fails and the
/// failure is audited like any other speech error.
pub struct DisabledRecognizer {
    reason: String,
}

impl DisabledRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for DisabledRecognizer {
    async fn transcribe(&self, _gcs_uri: &str) -> Result<String, IntakeError> {
        Err(IntakeError::SpeechError {
            message: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_models::Config;
    use serde_json::json;

    fn client() -> SpeechV2Client {
        let mut config = Config::default();
        config.gcp.project_id = Some("discovery-prod".into());
        SpeechV2Client::new(
            Client::new(),
            Arc::new(AccessTokens::anonymous()),
            &config.gcp,
            &config.speech,
        )
        .unwrap()
    }

    #[test]
    fn builds_regional_recognizer_url() {
        assert_eq!(
            client().recognize_url(),
            "https://us-west1-speech.googleapis.com/v2/projects/discovery-prod/locations/us-west1/recognizers/my-recognizer:recognize"
        );
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(client().request_for("gs://b/case1/a.mp3")).unwrap();
        assert_eq!(
            body,
            json!({
                "config": {
                    "autoDecodingConfig": {},
                    "languageCodes": ["en-US"],
                    "features": { "enableAutomaticPunctuation": true },
                    "model": "long"
                },
                "uri": "gs://b/case1/a.mp3"
            })
        );
    }

    #[test]
    fn transcript_joins_top_alternatives() {
        let response: RecognizeResponse = serde_json::from_value(json!({
            "results": [
                { "alternatives": [{ "transcript": " Good morning." }, { "transcript": "ignored" }] },
                { "alternatives": [] },
                { "alternatives": [{ "transcript": "State your name. " }] }
            ]
        }))
        .unwrap();
        assert_eq!(response.transcript(), "Good morning.\nState your name.");
        assert_eq!(RecognizeResponse::default().transcript(), "");
    }

    #[test]
    fn project_is_required() {
        let config = Config::default();
        let result = SpeechV2Client::new(
            Client::new(),
            Arc::new(AccessTokens::anonymous()),
            &config.gcp,
            &config.speech,
        );
        assert!(matches!(result, Err(IntakeError::ConfigError { .. })));
    }
}
