use crate::auth::AccessTokens;
use crate::storage::{ObjectMeta, ObjectStore, Precondition, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use intake_models::IntakeError;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const GENERATION_HEADER: &str = "x-goog-generation";

/// Object resource as returned by the JSON API. Numeric fields arrive as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObject {
    bucket: String,
    name: String,
    generation: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

impl GcsObject {
    fn into_meta(self) -> Result<ObjectMeta, IntakeError> {
        let generation = self
            .generation
            .parse::<i64>()
            .map_err(|e| IntakeError::storage(format!("bad generation '{}': {}", self.generation, e)))?;
        let size = self
            .size
            .as_deref()
            .unwrap_or("0")
            .parse::<u64>()
            .map_err(|e| IntakeError::storage(format!("bad size: {}", e)))?;
        Ok(ObjectMeta {
            bucket: self.bucket,
            name: self.name,
            generation,
            size,
            content_type: self.content_type,
        })
    }
}

/// `ObjectStore` backed by the Cloud Storage JSON API.
pub struct GcsStore {
    http: Client,
    endpoint: Url,
    tokens: Arc<AccessTokens>,
}

impl GcsStore {
    pub fn new(endpoint: &str, http: Client, tokens: Arc<AccessTokens>) -> Result<Self, IntakeError> {
        let endpoint = Url::parse(endpoint).map_err(|e| IntakeError::ConfigError {
            reason: format!("invalid storage endpoint '{}': {}", endpoint, e),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(IntakeError::ConfigError {
                reason: format!("storage endpoint '{}' cannot be a base URL", endpoint),
            });
        }
        Ok(Self {
            http,
            endpoint,
            tokens,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // cannot_be_a_base was rejected in new(), so this never fails
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `.../storage/v1/b/{bucket}/o/{name}` with the name percent-encoded as one segment.
    pub fn object_url(&self, bucket: &str, name: &str) -> Url {
        self.url(&["storage", "v1", "b", bucket, "o", name])
    }

    pub fn upload_url(&self, bucket: &str) -> Url {
        self.url(&["upload", "storage", "v1", "b", bucket, "o"])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, IntakeError> {
        self.tokens
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(IntakeError::storage)
    }

    async fn unexpected(response: Response, action: &str, bucket: &str, name: &str) -> IntakeError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        IntakeError::StorageError {
            message: format!(
                "{} gs://{}/{} failed with {}: {}",
                action,
                bucket,
                name,
                status,
                body.trim()
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    #[instrument(skip(self))]
    async fn stat(&self, bucket: &str, name: &str) -> Result<Option<ObjectMeta>, IntakeError> {
        let response = self.send(self.http.get(self.object_url(bucket, name))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let object: GcsObject = response.json().await.map_err(IntakeError::storage)?;
                object.into_meta().map(Some)
            }
            _ => Err(Self::unexpected(response, "stat", bucket, name).await),
        }
    }

    #[instrument(skip(self))]
    async fn read(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, IntakeError> {
        let mut url = self.object_url(bucket, name);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let generation = response
                    .headers()
                    .get(GENERATION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .ok_or_else(|| {
                        IntakeError::storage(format!("download of gs://{}/{} had no generation header", bucket, name))
                    })?;
                let data = response.bytes().await.map_err(IntakeError::storage)?;
                debug!(bytes = data.len(), generation, "Downloaded object");
                Ok(Some(StoredObject { data, generation }))
            }
            _ => Err(Self::unexpected(response, "download", bucket, name).await),
        }
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn write(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
        precondition: Precondition,
    ) -> Result<ObjectMeta, IntakeError> {
        let mut url = self.upload_url(bucket);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uploadType", "media");
            query.append_pair("name", name);
            if let Precondition::IfGenerationMatch(generation) = precondition {
                query.append_pair("ifGenerationMatch", &generation.to_string());
            }
        }

        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        let response = self.send(request).await?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(IntakeError::PreconditionFailed {
                bucket: bucket.to_string(),
                name: name.to_string(),
            }),
            status if status.is_success() => {
                let object: GcsObject = response.json().await.map_err(IntakeError::storage)?;
                object.into_meta()
            }
            _ => Err(Self::unexpected(response, "upload", bucket, name).await),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, bucket: &str, name: &str) -> Result<(), IntakeError> {
        let response = self.send(self.http.delete(self.object_url(bucket, name))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(IntakeError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(Self::unexpected(response, "delete", bucket, name).await),
        }
    }
}
