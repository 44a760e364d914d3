use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Instant;

pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static INSTALLMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RECONCILIATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DOCUMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Register every collector. Safe to call more than once; later calls are
/// no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    );
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    );
    let installments = IntCounterVec::new(
        Opts::new("billing_installments_total", "Installment edits by outcome"),
        &["outcome"],
    );
    let reconciliations = IntCounterVec::new(
        Opts::new(
            "billing_reconciliations_total",
            "Debit note reconciliation attempts by outcome",
        ),
        &["outcome"],
    );
    let documents = IntCounterVec::new(
        Opts::new("billing_documents_total", "Debit note documents by kind and outcome"),
        &["kind", "outcome"],
    );

    let (
        Ok(requests_total),
        Ok(request_duration),
        Ok(installments),
        Ok(reconciliations),
        Ok(documents),
    ) = (
        requests_total,
        request_duration,
        installments,
        reconciliations,
        documents,
    )
    else {
        tracing::error!("Failed to create metric collectors");
        return;
    };

    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(requests_total.clone()),
        Box::new(request_duration.clone()),
        Box::new(installments.clone()),
        Box::new(reconciliations.clone()),
        Box::new(documents.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::error!("Failed to register collector: {}", e);
        }
    }

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = INSTALLMENTS_TOTAL.set(installments);
    let _ = RECONCILIATIONS_TOTAL.set(reconciliations);
    let _ = DOCUMENTS_TOTAL.set(documents);
}

pub fn get_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_installment(outcome: &str) {
    if let Some(counter) = INSTALLMENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_reconciliation(outcome: &str) {
    if let Some(counter) = RECONCILIATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_document(kind: &str, outcome: &str) {
    if let Some(counter) = DOCUMENTS_TOTAL.get() {
        counter.with_label_values(&[kind, outcome]).inc();
    }
}

/// Count and time every request, labelled by route template rather than raw
/// URI to keep label cardinality bounded.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let labels = [method.as_str(), path.as_str(), status.as_str()];
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&labels).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&labels)
            .observe(start.elapsed().as_secs_f64());
    }

    response
}
