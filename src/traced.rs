use std::future::Future;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde_json::Value;
use tracing::{field, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::error::GatewayError;
use crate::paypal::extract_transaction;
use crate::telemetry::PaymentMetrics;

/// The externally-triggered operations this service performs. Error
/// classification is static per operation; the wrapper never derives a finer
/// taxonomy from the failure itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ClientId,
    CreateOrder,
    CaptureOrder,
}

impl Operation {
    pub fn span_name(self) -> &'static str {
        match self {
            Operation::ClientId => "get_client_id",
            Operation::CreateOrder => "create_paypal_order",
            Operation::CaptureOrder => "capture_paypal_order",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::ClientId => "client_id",
            Operation::CreateOrder => "create_order",
            Operation::CaptureOrder => "capture_order",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Operation::ClientId => "clientid",
            Operation::CreateOrder => "orders",
            Operation::CaptureOrder => "capture",
        }
    }

    fn error_type(self) -> &'static str {
        match self {
            Operation::ClientId => "client_id_error",
            Operation::CreateOrder => "order_creation_failed",
            Operation::CaptureOrder => "order_capture_failed",
        }
    }

    /// Orders and captures get a per-kind outcome counter; the client-id
    /// lookup only shows up in the generic request counter.
    fn kind_counter(self, metrics: &PaymentMetrics) -> Option<&opentelemetry::metrics::Counter<u64>> {
        match self {
            Operation::ClientId => None,
            Operation::CreateOrder => Some(&metrics.order_creations),
            Operation::CaptureOrder => Some(&metrics.order_captures),
        }
    }
}

/// Runs `body` inside a span named for the operation and records the uniform
/// telemetry shape around it: one started signal, one success-or-error
/// terminal signal, one duration measurement, no matter how the body exits.
/// The body's result is returned untouched; failures are classified and
/// recorded here but never swallowed or retried.
pub async fn run_traced<F>(
    op: Operation,
    metrics: &PaymentMetrics,
    attributes: Vec<KeyValue>,
    body: F,
) -> Result<Value, GatewayError>
where
    F: Future<Output = Result<Value, GatewayError>>,
{
    let span = tracing::info_span!(
        "paypal_operation",
        otel.name = op.span_name(),
        otel.status_code = field::Empty,
        otel.status_message = field::Empty,
    );
    for attribute in attributes {
        span.set_attribute(attribute.key, attribute.value);
    }

    metrics
        .requests
        .add(1, &[KeyValue::new("endpoint", op.endpoint())]);
    let kind_counter = op.kind_counter(metrics);
    if let Some(counter) = kind_counter {
        counter.add(1, &[KeyValue::new("status", "started")]);
    }

    let start = Instant::now();
    let result = body.instrument(span.clone()).await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };
    metrics.request_duration.record(
        duration,
        &[
            KeyValue::new("operation", op.name()),
            KeyValue::new("status", status),
        ],
    );
    if let Some(counter) = kind_counter {
        counter.add(1, &[KeyValue::new("status", status)]);
    }
    span.set_attribute("paypal.order.duration_seconds", duration);

    match &result {
        Ok(order) => {
            match op {
                Operation::CreateOrder => {
                    if let Some(id) = order.get("id").and_then(Value::as_str) {
                        span.set_attribute("paypal.order.id", id.to_owned());
                    }
                }
                Operation::CaptureOrder => {
                    if let Some(transaction) = extract_transaction(order) {
                        span.set_attribute("paypal.transaction.id", transaction.id);
                        span.set_attribute("paypal.transaction.status", transaction.status);
                    }
                }
                Operation::ClientId => {}
            }
            span.record("otel.status_code", "OK");
        }
        Err(error) => {
            metrics
                .errors
                .add(1, &[KeyValue::new("error_type", op.error_type())]);
            span.set_attribute("error", true);
            span.set_attribute("error.message", error.to_string());
            span.record("otel.status_code", "ERROR");
            span.record("otel.status_message", error.to_string().as_str());
        }
    }

    result
}
