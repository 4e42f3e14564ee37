//! Telemetry exporters and the request middleware feeding them.
//!
//! Spans and logs go to an OTLP collector over gRPC, metrics are rendered
//! for Prometheus on `/metrics`.
use axum::extract::{MatchedPath, Request};
use axum::http::{StatusCode, Version};
use axum::middleware::Next;
use axum::response::Response;
use metrics::Unit;
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle,
};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::{Span, TraceError, Tracer};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{LogError, SdkLogger, SdkLoggerProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;

use std::time::Instant;

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

const HTTP_REQUESTS: &str = "http_requests_total";
const HTTP_LATENCY: &str = "http_requests_duration_seconds";
const LATENCY_BUCKETS: &[f64] =
    &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Attributes attached to every exported span and log record.
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attributes([KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build()
}

/// Create the OTLP span pipeline.
pub fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, TraceError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Create the OTLP log pipeline, bridged from `tracing` events.
pub fn setup_logging(
    endpoint: &str,
) -> Result<OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>, LogError>
{
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider = SdkLoggerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build();

    Ok(OpenTelemetryTracingBridge::new(&provider))
}

/// Install the Prometheus recorder and describe exported metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    metrics::describe_counter!(
        "auth_attempts_total",
        Unit::Count,
        "Authentication attempts by outcome."
    );
    metrics::describe_counter!(
        HTTP_REQUESTS,
        Unit::Count,
        "HTTP requests by route and outcome."
    );
    metrics::describe_histogram!(
        HTTP_LATENCY,
        Unit::Seconds,
        "HTTP request latency."
    );

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_LATENCY.to_owned()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()
}

/// Coarse class of a response.
///
/// On `/login` it tells apart a rejected credential (`unauthorized`) from a
/// malformed request (`client_error`).
fn outcome(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "unauthorized",
        status if status.is_success() => "success",
        status if status.is_client_error() => "client_error",
        _ => "server_error",
    }
}

fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "unknown",
    }
}

/// Record one span, one counter increment and one latency sample per
/// request.
pub async fn track(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path(), MatchedPath::as_str)
        .to_owned();
    let method = req.method().to_string();
    let protocol = protocol(req.version());

    let mut span = global::tracer(SERVICE_NAME).start(format!("{method} {route}"));

    let response = next.run(req).await;

    let status = response.status();
    let outcome = outcome(status);

    span.set_attributes([
        KeyValue::new("http.request.method", method.clone()),
        KeyValue::new("http.route", route.clone()),
        KeyValue::new("http.response.status_code", i64::from(status.as_u16())),
        KeyValue::new("network.protocol.version", protocol),
        KeyValue::new("outcome", outcome),
    ]);
    span.end();

    let labels = [
        ("method", method),
        ("route", route),
        ("status", status.as_u16().to_string()),
        ("outcome", outcome.to_owned()),
    ];
    metrics::counter!(HTTP_REQUESTS, &labels).increment(1);
    metrics::histogram!(HTTP_LATENCY, &labels)
        .record(started.elapsed().as_secs_f64());

    response
}
