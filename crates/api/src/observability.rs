//! Logging and metrics setup

use crate::config::LoggingConfig;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

pub const USERS_CREATED: &str = "motion_stats_users_created_total";
pub const DEVICES_CREATED: &str = "motion_stats_devices_created_total";
pub const SAMPLES_CREATED: &str = "motion_stats_samples_created_total";
pub const ANALYSIS_REQUESTS: &str = "motion_stats_analysis_requests_total";

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

/// Install the global Prometheus recorder; only one per process
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
