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

/// Install the global tracing subscriber. `RUST_LOG` directives refine the
/// configured base level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quillpress_sessions_issued_total",
            Unit::Count,
            "Sessions issued after a successful login."
        );
        describe_counter!(
            "quillpress_sessions_revoked_total",
            Unit::Count,
            "Sessions ended by an explicit logout."
        );
        describe_counter!(
            "quillpress_sessions_expired_total",
            Unit::Count,
            "Sessions dropped after passing their expiry."
        );
        describe_counter!(
            "quillpress_login_failures_total",
            Unit::Count,
            "Login attempts rejected for bad credentials."
        );
        describe_counter!(
            "quillpress_slug_collisions_total",
            Unit::Count,
            "Slug candidates that needed a numeric suffix or a storage retry."
        );
        describe_counter!(
            "quillpress_post_cache_hit_total",
            Unit::Count,
            "Content resolver lookups answered from the post cache."
        );
        describe_counter!(
            "quillpress_post_cache_miss_total",
            Unit::Count,
            "Content resolver lookups that went to storage."
        );
    });
}
