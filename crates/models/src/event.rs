use crate::{IntakeError, ObjectRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type Cloud Storage emits once a new object (or generation) is written.
pub const OBJECT_FINALIZED: &str = "google.cloud.storage.object.v1.finalized";

pub const CLOUDEVENTS_SPEC_VERSION: &str = "1.0";

/// A CloudEvents 1.0 envelope as delivered over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    pub id: String,
    pub source: String,
    pub specversion: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Payload of `google.cloud.storage.object.v1.*` events. Only the fields
/// the intake pipeline reads are modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObjectData {
    pub bucket: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl StorageObjectData {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.bucket.clone(), self.name.clone())
    }
}

impl CloudEvent {
    /// Checks the required context attributes are present.
    pub fn validate(&self) -> Result<(), IntakeError> {
        for (attr, value) in [
            ("id", &self.id),
            ("source", &self.source),
            ("specversion", &self.specversion),
            ("type", &self.event_type),
        ] {
            if value.trim().is_empty() {
                return Err(IntakeError::InvalidEvent {
                    reason: format!("missing required attribute '{}'", attr),
                });
            }
        }
        if self.specversion != CLOUDEVENTS_SPEC_VERSION {
            return Err(IntakeError::InvalidEvent {
                reason: format!("unsupported specversion '{}'", self.specversion),
            });
        }
        Ok(())
    }

    pub fn storage_object(&self) -> Result<StorageObjectData, IntakeError> {
        let data = self.data.as_ref().ok_or_else(|| IntakeError::InvalidEvent {
            reason: "event has no data".to_string(),
        })?;
        let object: StorageObjectData =
            serde_json::from_value(data.clone()).map_err(|e| IntakeError::InvalidEvent {
                reason: format!("event data is not a storage object: {}", e),
            })?;
        if object.bucket.is_empty() || object.name.is_empty() {
            return Err(IntakeError::InvalidEvent {
                reason: "storage object is missing bucket or name".to_string(),
            });
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finalized(data: serde_json::Value) -> CloudEvent {
        CloudEvent {
            id: "1234".into(),
            source: "//storage.googleapis.com/projects/_/buckets/intake".into(),
            specversion: "1.0".into(),
            event_type: OBJECT_FINALIZED.into(),
            subject: Some("objects/case1/depo.mp3".into()),
            time: None,
            datacontenttype: Some("application/json".into()),
            data: Some(data),
        }
    }

    #[test]
    fn decodes_storage_payload_ignoring_extra_fields() {
        let event = finalized(json!({
            "bucket": "intake",
            "name": "case1/depo.mp3",
            "generation": "1712345678",
            "contentType": "audio/mpeg",
            "metageneration": "1",
            "storageClass": "STANDARD"
        }));
        let object = event.storage_object().unwrap();
        assert_eq!(object.bucket, "intake");
        assert_eq!(object.content_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(object.object_ref().gs_uri(), "gs://intake/case1/depo.mp3");
    }

    #[test]
    fn missing_name_is_invalid() {
        let event = finalized(json!({ "bucket": "intake" }));
        assert!(matches!(
            event.storage_object(),
            Err(IntakeError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn structured_json_uses_type_attribute() {
        let raw = json!({
            "id": "a",
            "source": "s",
            "specversion": "1.0",
            "type": OBJECT_FINALIZED,
            "time": "2024-05-01T12:00:00Z",
            "data": { "bucket": "b", "name": "n/x.pdf" }
        });
        let event: CloudEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type, OBJECT_FINALIZED);
        assert!(event.time.is_some());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_wrong_version() {
        let mut event = finalized(json!({}));
        event.source = String::new();
        assert!(event.validate().is_err());

        let mut event = finalized(json!({}));
        event.specversion = "0.3".into();
        assert!(event.validate().is_err());
    }
}
