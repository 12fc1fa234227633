use crate::storage::{ObjectMeta, ObjectStore, Precondition, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use intake_models::IntakeError;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    generation: i64,
    content_type: String,
}

/// In-process object store with GCS generation semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<(String, String), MemoryObject>,
    next_generation: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(bucket: &str, name: &str) -> (String, String) {
        (bucket.to_string(), name.to_string())
    }

    fn meta(bucket: &str, name: &str, object: &MemoryObject) -> ObjectMeta {
        ObjectMeta {
            bucket: bucket.to_string(),
            name: name.to_string(),
            generation: object.generation,
            size: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
        }
    }

    /// Unconditional write, returning the new generation.
    pub fn put(&self, bucket: &str, name: &str, data: impl Into<Bytes>) -> i64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.objects.insert(
            Self::key(bucket, name),
            MemoryObject {
                data: data.into(),
                generation,
                content_type: "application/octet-stream".to_string(),
            },
        );
        generation
    }

    pub fn contains(&self, bucket: &str, name: &str) -> bool {
        self.objects.contains_key(&Self::key(bucket, name))
    }

    pub fn get_bytes(&self, bucket: &str, name: &str) -> Option<Bytes> {
        self.objects
            .get(&Self::key(bucket, name))
            .map(|object| object.data.clone())
    }

    pub fn get_string(&self, bucket: &str, name: &str) -> Option<String> {
        self.get_bytes(bucket, name)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
    }

    /// Sorted object names in a bucket.
    pub fn names(&self, bucket: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn stat(&self, bucket: &str, name: &str) -> Result<Option<ObjectMeta>, IntakeError> {
        Ok(self
            .objects
            .get(&Self::key(bucket, name))
            .map(|object| Self::meta(bucket, name, &object)))
    }

    async fn read(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, IntakeError> {
        Ok(self
            .objects
            .get(&Self::key(bucket, name))
            .map(|object| StoredObject {
                data: object.data.clone(),
                generation: object.generation,
            }))
    }

    async fn write(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
        precondition: Precondition,
    ) -> Result<ObjectMeta, IntakeError> {
        let conflict = || IntakeError::PreconditionFailed {
            bucket: bucket.to_string(),
            name: name.to_string(),
        };

        // The entry holds the shard lock, so check-and-write is atomic per key.
        match self.objects.entry(Self::key(bucket, name)) {
            Entry::Occupied(mut occupied) => {
                if let Precondition::IfGenerationMatch(expected) = precondition {
                    if occupied.get().generation != expected {
                        return Err(conflict());
                    }
                }
                let object = MemoryObject {
                    data,
                    generation: self.next_generation.fetch_add(1, Ordering::SeqCst) + 1,
                    content_type: content_type.to_string(),
                };
                let meta = Self::meta(bucket, name, &object);
                occupied.insert(object);
                Ok(meta)
            }
            Entry::Vacant(vacant) => {
                if let Precondition::IfGenerationMatch(expected) = precondition {
                    if expected != 0 {
                        return Err(conflict());
                    }
                }
                let object = MemoryObject {
                    data,
                    generation: self.next_generation.fetch_add(1, Ordering::SeqCst) + 1,
                    content_type: content_type.to_string(),
                };
                let meta = Self::meta(bucket, name, &object);
                vacant.insert(object);
                Ok(meta)
            }
        }
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), IntakeError> {
        match self.objects.remove(&Self::key(bucket, name)) {
            Some(_) => Ok(()),
            None => Err(IntakeError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            }),
        }
    }
}
