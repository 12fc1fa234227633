pub mod auth;
pub mod gcs;
pub mod memory;
pub mod speech;
pub mod storage;

pub use auth::*;
pub use gcs::*;
pub use memory::*;
pub use speech::*;
pub use storage::*;

use intake_models::{GcpConfig, IntakeError, SpeechConfig};
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP client for every Google API call made by the service.
pub fn http_client(config: &GcpConfig) -> Result<reqwest::Client, IntakeError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("discovery-intake/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IntakeError::internal(format!("failed to build HTTP client: {}", e)))
}

/// One HTTP client and one credential source shared by the API clients.
#[derive(Clone)]
pub struct GcpClients {
    pub http: reqwest::Client,
    pub tokens: Arc<AccessTokens>,
}

impl GcpClients {
    pub fn from_config(config: &GcpConfig) -> Result<Self, IntakeError> {
        let http = http_client(config)?;
        let tokens = Arc::new(AccessTokens::from_config(config, http.clone()));
        Ok(Self { http, tokens })
    }

    pub fn storage(&self, config: &GcpConfig) -> Result<GcsStore, IntakeError> {
        GcsStore::new(&config.storage_endpoint, self.http.clone(), self.tokens.clone())
    }

    pub fn speech(&self, gcp: &GcpConfig, speech: &SpeechConfig) -> Result<SpeechV2Client, IntakeError> {
        SpeechV2Client::new(self.http.clone(), self.tokens.clone(), gcp, speech)
    }

    /// `gcp.project_id` when set, otherwise the project from the metadata server.
    pub async fn project_id(&self, gcp: &GcpConfig) -> Result<String, IntakeError> {
        match &gcp.project_id {
            Some(project) => Ok(project.clone()),
            None => metadata_project_id(&self.http, &gcp.metadata_endpoint).await,
        }
    }

    /// Like [`GcpClients::speech`], looking the project up when it is not configured.
    pub async fn discover_speech(
        &self,
        gcp: &GcpConfig,
        speech: &SpeechConfig,
    ) -> Result<SpeechV2Client, IntakeError> {
        let gcp = GcpConfig {
            project_id: Some(self.project_id(gcp).await?),
            ..gcp.clone()
        };
        self.speech(&gcp, speech)
    }
}
