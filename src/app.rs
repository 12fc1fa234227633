use intake_api::{start_server, AppState};
use intake_audit::AuditLog;
use intake_gcp::{DisabledRecognizer, GcpClients, MemoryStore, ObjectStore, SpeechRecognizer};
use intake_metrics::MetricsService;
use intake_models::{Config, IntakeError, StorageBackend};
use intake_pipeline::{AnalyzerSettings, DiscoveryAnalyzer, FunctionRegistry};
use intake_validation::FileValidator;
use std::sync::Arc;
use tracing::{info, warn};

/// Storage and speech backends the functions run against.
pub struct Backends {
    pub store: Arc<dyn ObjectStore>,
    pub speech: Arc<dyn SpeechRecognizer>,
}

impl Backends {
    pub async fn from_config(config: &Config) -> Result<Self, IntakeError> {
        match config.storage.backend {
            StorageBackend::Gcs => {
                let clients = GcpClients::from_config(&config.gcp)?;
                let speech: Arc<dyn SpeechRecognizer> =
                    match clients.discover_speech(&config.gcp, &config.speech).await {
                        Ok(client) => Arc::new(client),
                        Err(e) => {
                            // screening still runs; only transcription is lost
                            warn!(error = %e, "Speech-to-text disabled");
                            Arc::new(DisabledRecognizer::new(format!(
                                "speech-to-text is disabled: {}",
                                e
                            )))
                        }
                    };
                Ok(Self {
                    store: Arc::new(clients.storage(&config.gcp)?),
                    speech,
                })
            }
            StorageBackend::Memory => {
                warn!("Using the in-memory object store; nothing is persisted");
                let speech: Arc<dyn SpeechRecognizer> = if config.gcp.project_id.is_some() {
                    Arc::new(GcpClients::from_config(&config.gcp)?.speech(&config.gcp, &config.speech)?)
                } else {
                    Arc::new(DisabledRecognizer::new(
                        "speech-to-text is disabled: gcp.project_id is not set",
                    ))
                };
                Ok(Self {
                    store: Arc::new(MemoryStore::new()),
                    speech,
                })
            }
        }
    }
}

/// Every function this binary can serve, wired to the given backends.
pub fn build_registry(
    config: &Config,
    backends: &Backends,
    metrics: Arc<MetricsService>,
) -> FunctionRegistry {
    let validator = Arc::new(FileValidator::from_config(&config.validation));
    let audit = Arc::new(AuditLog::new(backends.store.clone(), &config.audit));
    let analyzer = DiscoveryAnalyzer::new(
        backends.store.clone(),
        backends.speech.clone(),
        validator,
        audit,
        metrics,
        AnalyzerSettings::from_config(config),
    );

    let mut registry = FunctionRegistry::new();
    registry.register(Arc::new(analyzer));
    registry
}

/// Resolves `function.target` and assembles the HTTP state around it.
pub fn build_state(config: Config, backends: &Backends) -> Result<AppState, IntakeError> {
    let metrics = Arc::new(MetricsService::new()?);
    let registry = build_registry(&config, backends, metrics.clone());
    let function = registry.resolve(&config.function.target).map_err(|e| {
        warn!(available = ?registry.names(), "Unknown function target");
        e
    })?;
    Ok(AppState::new(config, function, metrics))
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let backends = Backends::from_config(&config).await?;
    let state = build_state(config, &backends)?;
    info!(
        target_fn = %state.function.name(),
        backend = ?state.config.storage.backend,
        output_bucket = %state.config.storage.output_bucket,
        "Discovery intake ready"
    );
    start_server(state).await.map_err(|e| anyhow::anyhow!(e))
}
