use crate::fakes::{FakeProbe, FakeSpeech};
use intake_audit::AuditLog;
use intake_gcp::MemoryStore;
use intake_metrics::MetricsService;
use intake_models::Config;
use intake_pipeline::{AnalyzerSettings, DiscoveryAnalyzer};
use intake_validation::FileValidator;
use std::sync::Arc;
use tempfile::TempDir;

/// Bucket uploads land in during tests.
pub const INTAKE_BUCKET: &str = "discovery-intake";

/// A fully wired analyzer over an in-memory store, fake probe and fake speech.
pub struct Harness {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub probe: FakeProbe,
    pub speech: FakeSpeech,
    pub metrics: Arc<MetricsService>,
    pub analyzer: Arc<DiscoveryAnalyzer>,
    scratch: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeProbe::healthy(), FakeSpeech::new())
    }

    pub fn with(probe: FakeProbe, speech: FakeSpeech) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.scratch_dir = Some(scratch.path().to_string_lossy().into_owned());
        config.audit.backoff_ms = 1;

        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(MetricsService::new().unwrap());
        let validator = Arc::new(FileValidator::new(
            Arc::new(probe.clone()),
            config.validation.reject_unsupported,
        ));
        let audit = Arc::new(AuditLog::new(store.clone(), &config.audit));
        let analyzer = Arc::new(DiscoveryAnalyzer::new(
            store.clone(),
            Arc::new(speech.clone()),
            validator,
            audit,
            metrics.clone(),
            AnalyzerSettings::from_config(&config),
        ));

        Self {
            config,
            store,
            probe,
            speech,
            metrics,
            analyzer,
            scratch,
        }
    }

    pub fn upload(&self, name: &str, bytes: impl Into<Vec<u8>>) -> i64 {
        self.store.put(INTAKE_BUCKET, name, bytes.into())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.store.contains(INTAKE_BUCKET, name)
    }

    pub fn transcript(&self, name: &str) -> Option<String> {
        self.store.get_string(&self.config.storage.output_bucket, name)
    }

    pub fn audit_lines(&self) -> Vec<String> {
        self.store
            .get_string(&self.config.audit.bucket, &self.config.audit.object)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// True once every per-event scratch directory has been cleaned up.
    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
