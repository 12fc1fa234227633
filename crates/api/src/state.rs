use intake_metrics::MetricsService;
use intake_models::Config;
use intake_pipeline::CloudEventFunction;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub function: Arc<dyn CloudEventFunction>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(
        config: Config,
        function: Arc<dyn CloudEventFunction>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            config,
            function,
            metrics,
        }
    }
}
