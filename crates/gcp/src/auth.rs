use intake_models::{GcpConfig, IntakeError};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const PROJECT_ID_PATH: &str = "/computeMetadata/v1/project/project-id";
const REFRESH_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum TokenSource {
    Static(String),
    Metadata { endpoint: String },
    Anonymous,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Supplies OAuth bearer tokens for Google API requests.
pub struct AccessTokens {
    source: TokenSource,
    http: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl AccessTokens {
    pub fn from_config(config: &GcpConfig, http: Client) -> Self {
        let source = if config.anonymous {
            TokenSource::Anonymous
        } else if let Some(token) = config.access_token.clone() {
            TokenSource::Static(token)
        } else {
            TokenSource::Metadata {
                endpoint: config.metadata_endpoint.trim_end_matches('/').to_string(),
            }
        };
        Self {
            source,
            http,
            cached: RwLock::new(None),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            source: TokenSource::Anonymous,
            http: Client::new(),
            cached: RwLock::new(None),
        }
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            http: Client::new(),
            cached: RwLock::new(None),
        }
    }

    pub async fn bearer(&self) -> Result<Option<String>, IntakeError> {
        match &self.source {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata { endpoint } => {
                if let Some(cached) = self.cached.read().await.as_ref() {
                    if Instant::now() < cached.refresh_at {
                        return Ok(Some(cached.value.clone()));
                    }
                }
                let mut slot = self.cached.write().await;
                // another task may have refreshed while we waited for the lock
                if let Some(cached) = slot.as_ref() {
                    if Instant::now() < cached.refresh_at {
                        return Ok(Some(cached.value.clone()));
                    }
                }
                let fresh = self.fetch_metadata_token(endpoint).await?;
                let value = fresh.value.clone();
                *slot = Some(fresh);
                Ok(Some(value))
            }
        }
    }

    /// Adds the `Authorization` header when a token is available.
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, IntakeError> {
        Ok(match self.bearer().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_metadata_token(&self, endpoint: &str) -> Result<CachedToken, IntakeError> {
        let response = self
            .http
            .get(format!("{}{}", endpoint, TOKEN_PATH))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| IntakeError::AuthError {
                message: format!("metadata server unreachable: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(IntakeError::AuthError {
                message: format!("metadata server returned {}", response.status()),
            });
        }

        let token: MetadataToken = response.json().await.map_err(|e| IntakeError::AuthError {
            message: format!("malformed token response: {}", e),
        })?;
        debug!(expires_in = token.expires_in, "Fetched access token from metadata server");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_SKEW);
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

/// Project the workload runs in, as reported by the metadata server.
#[instrument(skip(http))]
pub async fn metadata_project_id(http: &Client, endpoint: &str) -> Result<String, IntakeError> {
    let url = format!("{}{}", endpoint.trim_end_matches('/'), PROJECT_ID_PATH);
    let response = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| IntakeError::ConfigError {
            reason: format!("project id lookup failed: metadata server unreachable: {}", e),
        })?;

    if !response.status().is_success() {
        return Err(IntakeError::ConfigError {
            reason: format!("project id lookup failed: metadata server returned {}", response.status()),
        });
    }

    let body = response.text().await.map_err(|e| IntakeError::ConfigError {
        reason: format!("project id lookup failed: {}", e),
    })?;
    let project = body.trim();
    if project.is_empty() {
        return Err(IntakeError::ConfigError {
            reason: "project id lookup failed: metadata server returned an empty project".to_string(),
        });
    }
    debug!(project = %project, "Resolved project from metadata server");
    Ok(project.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_and_anonymous_sources() {
        assert_eq!(
            AccessTokens::fixed("abc").bearer().await.unwrap().as_deref(),
            Some("abc")
        );
        assert!(AccessTokens::anonymous().bearer().await.unwrap().is_none());
    }

    #[test]
    fn config_selects_source() {
        let mut config = GcpConfig {
            anonymous: true,
            access_token: Some("ignored".into()),
            ..intake_models::Config::default().gcp
        };
        let tokens = AccessTokens::from_config(&config, Client::new());
        assert!(matches!(tokens.source, TokenSource::Anonymous));

        config.anonymous = false;
        let tokens = AccessTokens::from_config(&config, Client::new());
        assert!(matches!(tokens.source, TokenSource::Static(_)));

        config.access_token = None;
        let tokens = AccessTokens::from_config(&config, Client::new());
        assert!(matches!(tokens.source, TokenSource::Metadata { .. }));
    }
}
