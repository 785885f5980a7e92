use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Registers descriptions for every counter the listing pipeline emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "agora_listings_cache_hit_total",
            Unit::Count,
            "Listing pages served from the cache."
        );
        describe_counter!(
            "agora_listings_cache_miss_total",
            Unit::Count,
            "Listing pages that had to be read from the relational store."
        );
        describe_counter!(
            "agora_listings_cache_store_failed_total",
            Unit::Count,
            "Listing pages that could not be written to the cache."
        );
        describe_counter!(
            "agora_listings_compensation_total",
            Unit::Count,
            "Compensating attachment deletes attempted after a failed creation."
        );
        describe_counter!(
            "agora_listings_compensation_failed_total",
            Unit::Count,
            "Compensating attachment deletes that failed or timed out."
        );
    });
}
