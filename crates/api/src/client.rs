use crate::cloudevent::STRUCTURED_CONTENT_TYPE;
use anyhow::Result;
use intake_models::CloudEvent;
use reqwest::{header::CONTENT_TYPE, Client, Response};

/// Delivers CloudEvents to a running function the way Eventarc does.
pub struct EventClient {
    client: Client,
    base_url: String,
}

impl EventClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Attributes as `ce-*` headers, `data` as the body.
    pub async fn send_binary(&self, event: &CloudEvent) -> Result<Response> {
        let mut request = self
            .client
            .post(format!("{}/", self.base_url))
            .header("ce-id", &event.id)
            .header("ce-source", &event.source)
            .header("ce-type", &event.event_type)
            .header("ce-specversion", &event.specversion);
        if let Some(subject) = &event.subject {
            request = request.header("ce-subject", subject);
        }
        if let Some(time) = &event.time {
            request = request.header("ce-time", time.to_rfc3339());
        }

        let content_type = event
            .datacontenttype
            .clone()
            .unwrap_or_else(|| "application/json".to_string());
        let body = match &event.data {
            Some(data) => serde_json::to_vec(data)?,
            None => Vec::new(),
        };

        Ok(request
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?)
    }

    /// The whole event as one JSON document.
    pub async fn send_structured(&self, event: &CloudEvent) -> Result<Response> {
        Ok(self
            .client
            .post(format!("{}/", self.base_url))
            .header(CONTENT_TYPE, STRUCTURED_CONTENT_TYPE)
            .body(serde_json::to_vec(event)?)
            .send()
            .await?)
    }

    pub async fn health(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/healthz", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
