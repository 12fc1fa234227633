use async_trait::async_trait;
use bytes::Bytes;
use intake_models::IntakeError;
use std::path::Path;
use tracing::{info, instrument};

pub const FOLDER_CONTENT_TYPE: &str = "application/x-directory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub bucket: String,
    pub name: String,
    pub generation: i64,
    pub size: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub generation: i64,
}

/// Write guard evaluated atomically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    /// Succeeds only if the live generation equals the value; `0` means the
    /// object must not exist yet.
    IfGenerationMatch(i64),
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn stat(&self, bucket: &str, name: &str) -> Result<Option<ObjectMeta>, IntakeError>;

    /// Object bytes together with the generation they were read from.
    async fn read(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, IntakeError>;

    async fn write(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
        precondition: Precondition,
    ) -> Result<ObjectMeta, IntakeError>;

    /// Fails with `ObjectNotFound` when nothing is stored under the name.
    async fn delete(&self, bucket: &str, name: &str) -> Result<(), IntakeError>;
}

/// Streams an object to a local file and returns the number of bytes written.
#[instrument(skip(store, dest), fields(dest = %dest.display()))]
pub async fn download_to_path(
    store: &dyn ObjectStore,
    bucket: &str,
    name: &str,
    dest: &Path,
) -> Result<u64, IntakeError> {
    let object = store
        .read(bucket, name)
        .await?
        .ok_or_else(|| IntakeError::ObjectNotFound {
            bucket: bucket.to_string(),
            name: name.to_string(),
        })?;
    tokio::fs::write(dest, &object.data).await?;
    Ok(object.data.len() as u64)
}

/// Normalizes a folder name to its placeholder object name: no leading
/// slash, exactly one trailing slash.
pub fn folder_object_name(folder: &str) -> String {
    let trimmed = folder.trim_start_matches('/');
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Creates the zero-byte placeholder object the console renders as a folder.
pub async fn create_folder(
    store: &dyn ObjectStore,
    bucket: &str,
    folder: &str,
) -> Result<String, IntakeError> {
    let name = folder_object_name(folder);
    if name == "/" {
        return Err(IntakeError::StorageError {
            message: "folder name must not be empty".to_string(),
        });
    }
    store
        .write(bucket, &name, Bytes::new(), FOLDER_CONTENT_TYPE, Precondition::None)
        .await?;
    info!(bucket = %bucket, folder = %name, "Created folder");
    Ok(name)
}
