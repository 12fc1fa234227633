pub mod app;

pub use app::*;

// Re-export commonly used items for convenience
pub use intake_api::{start_server, AppState};
pub use intake_metrics::{MetricsService, TracingService};
pub use intake_models::Config;
pub use intake_pipeline::{DiscoveryAnalyzer, FunctionRegistry, ANALYZE_DISCOVERY_MATERIAL};
