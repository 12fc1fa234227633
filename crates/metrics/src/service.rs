use intake_models::IntakeError;
use prometheus::{Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

fn metric_err(e: prometheus::Error) -> IntakeError {
    IntakeError::InternalError {
        reason: e.to_string(),
    }
}

pub struct MetricsService {
    registry: Registry,
    events_total: Counter,
    outcomes_total: CounterVec,
    objects_deleted_total: Counter,
    transcriptions_total: Counter,
    transcription_failures_total: Counter,
    audit_conflicts_total: Counter,
    audit_failures_total: Counter,
    handler_duration_ms: Histogram,
}

impl MetricsService {
    pub fn new() -> Result<Self, IntakeError> {
        let registry = Registry::new();

        let events_total = Counter::new(
            "intake_events_total",
            "Total number of CloudEvents dispatched to the function",
        )
        .map_err(metric_err)?;

        let outcomes_total = CounterVec::new(
            Opts::new("intake_outcomes_total", "Handled events by outcome"),
            &["outcome"],
        )
        .map_err(metric_err)?;

        let objects_deleted_total = Counter::new(
            "intake_objects_deleted_total",
            "Total number of uploads deleted as disallowed or invalid",
        )
        .map_err(metric_err)?;

        let transcriptions_total = Counter::new(
            "intake_transcriptions_total",
            "Total number of transcripts written",
        )
        .map_err(metric_err)?;

        let transcription_failures_total = Counter::new(
            "intake_transcription_failures_total",
            "Total number of failed speech-to-text attempts",
        )
        .map_err(metric_err)?;

        let audit_conflicts_total = Counter::new(
            "intake_audit_conflicts_total",
            "Audit log appends retried because of a concurrent writer",
        )
        .map_err(metric_err)?;

        let audit_failures_total = Counter::new(
            "intake_audit_failures_total",
            "Audit log entries that could not be written",
        )
        .map_err(metric_err)?;

        let handler_duration_ms = Histogram::with_opts(
            HistogramOpts::new(
                "intake_handler_duration_ms",
                "Event handling duration in milliseconds",
            )
            .buckets(vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 15000.0, 60000.0, 300000.0]),
        )
        .map_err(metric_err)?;

        registry.register(Box::new(events_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(outcomes_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(objects_deleted_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(transcriptions_total.clone())).map_err(metric_err)?;
        registry
            .register(Box::new(transcription_failures_total.clone()))
            .map_err(metric_err)?;
        registry.register(Box::new(audit_conflicts_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(audit_failures_total.clone())).map_err(metric_err)?;
        registry.register(Box::new(handler_duration_ms.clone())).map_err(metric_err)?;

        Ok(Self {
            registry,
            events_total,
            outcomes_total,
            objects_deleted_total,
            transcriptions_total,
            transcription_failures_total,
            audit_conflicts_total,
            audit_failures_total,
            handler_duration_ms,
        })
    }

    pub fn record_event(&self) {
        self.events_total.inc();
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.outcomes_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_object_deleted(&self) {
        self.objects_deleted_total.inc();
    }

    pub fn record_transcription(&self, ok: bool) {
        if ok {
            self.transcriptions_total.inc();
        } else {
            self.transcription_failures_total.inc();
        }
    }

    pub fn record_audit_conflicts(&self, conflicts: u32) {
        self.audit_conflicts_total.inc_by(conflicts as f64);
    }

    pub fn record_audit_failure(&self) {
        self.audit_failures_total.inc();
    }

    pub fn record_duration(&self, duration_ms: f64) {
        self.handler_duration_ms.observe(duration_ms);
    }

    pub fn outcome_count(&self, outcome: &str) -> f64 {
        self.outcomes_total.with_label_values(&[outcome]).get()
    }

    pub fn objects_deleted(&self) -> f64 {
        self.objects_deleted_total.get()
    }

    pub fn get_prometheus_metrics(&self) -> Result<String, IntakeError> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder.encode(&metric_families, &mut buffer).map_err(metric_err)?;

        String::from_utf8(buffer).map_err(IntakeError::internal)
    }
}
