use intake_models::{IntakeError, LogFormat, LoggingConfig};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

pub struct TracingService;

impl TracingService {
    /// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
    pub fn init(config: &LoggingConfig) -> Result<(), IntakeError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .map_err(|e| IntakeError::ConfigError {
                reason: format!("invalid log level '{}': {}", config.level, e),
            })?;

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(UtcTime::rfc_3339());

        let result = match config.format {
            LogFormat::Json => builder.json().with_current_span(true).try_init(),
            LogFormat::Pretty => builder.try_init(),
        };
        result.map_err(|e| IntakeError::internal(format!("tracing already initialized: {}", e)))
    }

    pub fn log_event_received(event_id: &str, event_type: &str, bucket: &str, name: &str) {
        info!(
            event_id = %event_id,
            event_type = %event_type,
            bucket = %bucket,
            object = %name,
            "CloudEvent received"
        );
    }

    pub fn log_object_deleted(bucket: &str, name: &str, reason: &str) {
        warn!(
            bucket = %bucket,
            object = %name,
            reason = %reason,
            "Object deleted"
        );
    }

    pub fn log_transcript_written(source_uri: &str, transcript_uri: &str, chars: usize) {
        info!(
            source = %source_uri,
            transcript = %transcript_uri,
            chars = chars,
            "Transcript uploaded"
        );
    }
}
