use chrono::Utc;
use intake_models::{CloudEvent, CLOUDEVENTS_SPEC_VERSION, OBJECT_FINALIZED};
use serde_json::{json, Value};

/// Builds CloudEvents shaped like the ones Eventarc delivers for Cloud Storage.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: CloudEvent,
}

impl EventBuilder {
    pub fn finalized(bucket: &str, name: &str) -> Self {
        Self {
            event: CloudEvent {
                id: uuid::Uuid::new_v4().to_string(),
                source: format!("//storage.googleapis.com/projects/_/buckets/{}", bucket),
                specversion: CLOUDEVENTS_SPEC_VERSION.to_string(),
                event_type: OBJECT_FINALIZED.to_string(),
                subject: Some(format!("objects/{}", name)),
                time: Some(Utc::now()),
                datacontenttype: Some("application/json".to_string()),
                data: Some(json!({
                    "kind": "storage#object",
                    "bucket": bucket,
                    "name": name,
                    "generation": "1",
                    "size": "0",
                })),
            },
        }
    }

    pub fn event_type(mut self, event_type: &str) -> Self {
        self.event.event_type = event_type.to_string();
        self
    }

    pub fn data(mut self, data: Option<Value>) -> Self {
        self.event.data = data;
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.event.id = id.to_string();
        self
    }

    pub fn build(self) -> CloudEvent {
        self.event
    }
}

pub fn finalized_event(bucket: &str, name: &str) -> CloudEvent {
    EventBuilder::finalized(bucket, name).build()
}
