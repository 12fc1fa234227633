use crate::cloudevent::parse_event;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use intake_models::{ErrorShape, IntakeError};
use tracing::{error, info, instrument, warn};

fn error_response(e: &IntakeError) -> (StatusCode, Json<ErrorShape>) {
    (
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(e.to_error_shape()),
    )
}

/// Decodes the CloudEvent and hands it to the configured function.
#[instrument(skip(state, headers, body))]
pub async fn invoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), (StatusCode, Json<ErrorShape>)> {
    let event = match parse_event(&headers, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejecting request: {}", e);
            return Err(error_response(&e));
        }
    };
    info!(
        function = %state.function.name(),
        event_id = %event.id,
        event_type = %event.event_type,
        "Dispatching CloudEvent"
    );

    match state.function.call(event).await {
        Ok(()) => Ok((StatusCode::OK, "OK")),
        Err(e) => {
            error!("Function {} failed: {}", state.function.name(), e);
            Err(error_response(&e))
        }
    }
}

pub async fn health_check(State(_state): State<AppState>) -> Result<&'static str, StatusCode> {
    Ok("OK")
}

#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    match state.metrics.get_prometheus_metrics() {
        Ok(metrics) => Ok(metrics),
        Err(e) => {
            error!("Failed to get metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
