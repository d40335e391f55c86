use crate::OtelConfig;
use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{ExportConfig, WithExportConfig};
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{RandomIdGenerator, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static RESOURCE: Lazy<Resource> = Lazy::new(|| {
    Resource::new(vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            "paypal-checkout-server",
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ),
        KeyValue::new("deployment.environment", "development"),
    ])
});

/// Counters and histogram backing the traced operation pipeline. Registered
/// once at startup and shared by every handler invocation; OTel instruments
/// accumulate atomically under concurrent requests.
#[derive(Clone, Debug)]
pub struct PaymentMetrics {
    pub requests: Counter<u64>,
    pub order_creations: Counter<u64>,
    pub order_captures: Counter<u64>,
    pub errors: Counter<u64>,
    pub request_duration: Histogram<f64>,
}

impl PaymentMetrics {
    pub fn new(meter: &Meter) -> Self {
        let requests = meter
            .u64_counter("paypal_requests_total")
            .with_description("Total number of PayPal API requests")
            .init();

        let order_creations = meter
            .u64_counter("paypal_order_creations_total")
            .with_description("Total number of PayPal order creations")
            .init();

        let order_captures = meter
            .u64_counter("paypal_order_captures_total")
            .with_description("Total number of PayPal order captures")
            .init();

        let errors = meter
            .u64_counter("paypal_errors_total")
            .with_description("Total number of PayPal errors")
            .init();

        let request_duration = meter
            .f64_histogram("paypal_request_duration_seconds")
            .with_description("Duration of PayPal requests")
            .with_unit("s")
            .init();

        Self {
            requests,
            order_creations,
            order_captures,
            errors,
            request_duration,
        }
    }
}

fn init_stdout_tracer() -> Tracer {
    TracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .with_config(opentelemetry_sdk::trace::Config::default().with_resource(RESOURCE.clone()))
        .build()
        .tracer("stdout")
}

/// OTLP tracer with a console fallback: an unreachable collector must never
/// block request handling.
fn init_tracer(otel_config: &OtelConfig) -> Tracer {
    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_resource(RESOURCE.clone())
                .with_id_generator(RandomIdGenerator::default()),
        )
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(otel_config.endpoint.clone())
                .with_timeout(std::time::Duration::from_secs(5)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio);

    match provider {
        Ok(provider) => provider.tracer("paypal_checkout"),
        Err(error) => {
            eprintln!("otlp trace exporter unavailable, using stdout: {error}");
            init_stdout_tracer()
        }
    }
}

pub fn build_metrics_provider(otel_config: &OtelConfig) -> SdkMeterProvider {
    let export_config = ExportConfig {
        endpoint: otel_config.endpoint.clone(),
        ..ExportConfig::default()
    };
    let provider = opentelemetry_otlp::new_pipeline()
        .metrics(opentelemetry_sdk::runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_timeout(std::time::Duration::from_secs(2))
                .with_export_config(export_config),
        )
        .with_resource(RESOURCE.clone())
        .build();

    match provider {
        Ok(provider) => provider,
        Err(error) => {
            eprintln!("otlp metrics exporter unavailable, using stdout: {error}");
            let reader = PeriodicReader::builder(
                opentelemetry_stdout::MetricsExporter::default(),
                opentelemetry_sdk::runtime::Tokio,
            )
            .build();
            SdkMeterProvider::builder()
                .with_reader(reader)
                .with_resource(RESOURCE.clone())
                .build()
        }
    }
}

fn init_logs(otel_config: &OtelConfig) -> Option<LoggerProvider> {
    opentelemetry_otlp::new_pipeline()
        .logging()
        .with_resource(RESOURCE.clone())
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(otel_config.endpoint.clone())
                .with_timeout(std::time::Duration::from_secs(2)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .map_err(|error| eprintln!("otlp log exporter unavailable, logs stay local: {error}"))
        .ok()
}

pub fn init_subscriber(otel_config: &OtelConfig) {
    let tracer = init_tracer(otel_config);
    let trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let logger_layer =
        init_logs(otel_config).map(|provider| OpenTelemetryTracingBridge::new(&provider));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_target(true)
                .with_span_events(FmtSpan::ACTIVE)
                .compact(),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .with(trace_layer)
        .with(logger_layer)
        .init();
}
