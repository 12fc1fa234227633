//! CloudEvents HTTP protocol binding: binary and structured content modes.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use intake_models::{CloudEvent, IntakeError};
use serde_json::Value;

pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";
pub const BATCH_CONTENT_TYPE: &str = "application/cloudevents-batch+json";

/// Decodes and validates the CloudEvent carried by an HTTP request.
pub fn parse_event(headers: &HeaderMap, body: &Bytes) -> Result<CloudEvent, IntakeError> {
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str());
    let media_type = content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

    let event = match media_type.as_deref() {
        Some(STRUCTURED_CONTENT_TYPE) => parse_structured(body)?,
        Some(BATCH_CONTENT_TYPE) => {
            return Err(invalid("batched CloudEvents are not supported"));
        }
        _ => parse_binary(headers, content_type, body)?,
    };
    event.validate()?;
    Ok(event)
}

fn parse_structured(body: &Bytes) -> Result<CloudEvent, IntakeError> {
    serde_json::from_slice(body).map_err(|e| invalid(&format!("malformed structured CloudEvent: {}", e)))
}

fn parse_binary(
    headers: &HeaderMap,
    content_type: Option<String>,
    body: &Bytes,
) -> Result<CloudEvent, IntakeError> {
    if !headers.keys().any(|name| name.as_str().starts_with("ce-")) {
        return Err(invalid("request carries no CloudEvent attributes"));
    }
    let required = |name: &str| {
        header_str(headers, name).ok_or_else(|| invalid(&format!("missing required header '{}'", name)))
    };

    let time = match header_str(headers, "ce-time") {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| invalid(&format!("ce-time is not RFC 3339: {}", e)))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let data = if body.is_empty() {
        None
    } else if content_type.as_deref().map_or(true, is_json) {
        Some(
            serde_json::from_slice(body)
                .map_err(|e| invalid(&format!("event data is not valid JSON: {}", e)))?,
        )
    } else {
        Some(Value::String(String::from_utf8_lossy(body).into_owned()))
    };

    Ok(CloudEvent {
        id: required("ce-id")?,
        source: required("ce-source")?,
        specversion: required("ce-specversion")?,
        event_type: required("ce-type")?,
        subject: header_str(headers, "ce-subject"),
        time,
        datacontenttype: content_type,
        data,
    })
}

fn is_json(content_type: &str) -> bool {
    let media = content_type.split(';').next().unwrap_or(content_type).trim();
    media.eq_ignore_ascii_case("application/json") || media.ends_with("+json")
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn invalid(reason: &str) -> IntakeError {
    IntakeError::InvalidEvent {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn binary_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("ce-id", HeaderValue::from_static("42"));
        headers.insert(
            "ce-source",
            HeaderValue::from_static("//storage.googleapis.com/projects/_/buckets/intake"),
        );
        headers.insert(
            "ce-type",
            HeaderValue::from_static("google.cloud.storage.object.v1.finalized"),
        );
        headers.insert("ce-specversion", HeaderValue::from_static("1.0"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn binary_mode() {
        let mut headers = binary_headers();
        headers.insert("ce-time", HeaderValue::from_static("2024-05-01T12:00:00.5Z"));
        headers.insert("ce-subject", HeaderValue::from_static("objects/case1/a.pdf"));
        let body = Bytes::from(json!({"bucket": "intake", "name": "case1/a.pdf"}).to_string());

        let event = parse_event(&headers, &body).unwrap();
        assert_eq!(event.id, "42");
        assert_eq!(event.subject.as_deref(), Some("objects/case1/a.pdf"));
        assert!(event.time.is_some());
        assert_eq!(event.storage_object().unwrap().name, "case1/a.pdf");
    }

    #[test]
    fn binary_mode_requires_attributes() {
        let mut headers = binary_headers();
        headers.remove("ce-type");
        let err = parse_event(&headers, &Bytes::from_static(b"{}")).unwrap_err();
        assert!(err.to_string().contains("ce-type"));

        let mut plain = HeaderMap::new();
        plain.insert("content-type", HeaderValue::from_static("application/json"));
        assert!(parse_event(&plain, &Bytes::from_static(b"{}")).is_err());
    }

    #[test]
    fn bad_time_and_bad_json_are_rejected() {
        let mut headers = binary_headers();
        headers.insert("ce-time", HeaderValue::from_static("yesterday"));
        assert!(parse_event(&headers, &Bytes::from_static(b"{}")).is_err());

        let headers = binary_headers();
        assert!(parse_event(&headers, &Bytes::from_static(b"{not json")).is_err());
    }

    #[test]
    fn structured_mode() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/cloudevents+json; charset=utf-8"),
        );
        let body = Bytes::from(
            json!({
                "id": "7",
                "source": "//storage.googleapis.com/projects/_/buckets/intake",
                "specversion": "1.0",
                "type": "google.cloud.storage.object.v1.finalized",
                "data": {"bucket": "intake", "name": "case1/a.pdf"}
            })
            .to_string(),
        );
        let event = parse_event(&headers, &body).unwrap();
        assert_eq!(event.id, "7");

        let wrong_version = Bytes::from(
            json!({"id": "7", "source": "s", "specversion": "0.3", "type": "t"}).to_string(),
        );
        assert!(parse_event(&headers, &wrong_version).is_err());
    }

    #[test]
    fn batches_are_refused() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static(BATCH_CONTENT_TYPE));
        assert!(parse_event(&headers, &Bytes::from_static(b"[]")).is_err());
    }
}
