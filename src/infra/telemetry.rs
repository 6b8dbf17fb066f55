use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "certifier_certificates_generated_total",
            Unit::Count,
            "Certificates whose document was rendered and stored."
        );
        describe_counter!(
            "certifier_certificate_generation_failures_total",
            Unit::Count,
            "Certificate generation attempts that ended in error."
        );
        describe_counter!(
            "certifier_deliveries_sent_total",
            Unit::Count,
            "Certificate emails accepted by the mail endpoint."
        );
        describe_counter!(
            "certifier_delivery_failures_total",
            Unit::Count,
            "Certificate emails that could not be sent."
        );
        describe_counter!(
            "certifier_jobs_rescheduled_total",
            Unit::Count,
            "Failed jobs pushed back onto the queue with a backoff delay."
        );
        describe_histogram!(
            "certifier_http_request_duration_ms",
            Unit::Milliseconds,
            "Inbound API request latency in milliseconds."
        );
    });
}
