//! Tracing initialization from the logging config.

use rover_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

pub(crate) fn init_logging(config: &LoggingConfig) {
    let filter = match &config.filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }

    if let Some(label) = &config.service_label {
        tracing::info!(label, "logging initialized");
    }
}
