//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.
//! All recorders are no-ops until an exporter is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all DocChat metrics
pub const METRICS_PREFIX: &str = "docchat";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for model call latency (typically much slower)
pub const MODEL_CALL_BUCKETS: &[f64] = &[
    0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 20.00, 30.00, 60.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval-augmented lookups"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chunk ranking latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_candidate_chunks", METRICS_PREFIX),
        Unit::Count,
        "Chunks considered by the last retrieval"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_document_chars_total", METRICS_PREFIX),
        Unit::Count,
        "Total characters of extracted document text"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    // Model metrics
    describe_counter!(
        format!("{}_model_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat model calls"
    );

    describe_histogram!(
        format!("{}_model_call_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat model latency in seconds"
    );

    describe_counter!(
        format!("{}_model_tokens_total", METRICS_PREFIX),
        Unit::Count,
        "Tokens reported by the chat model"
    );

    // Context metrics
    describe_counter!(
        format!("{}_context_messages_kept_total", METRICS_PREFIX),
        Unit::Count,
        "History messages kept within the context budget"
    );

    describe_counter!(
        format!("{}_context_messages_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "History messages dropped by truncation"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, candidate_chunks: usize, returned: usize) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "empty" => (returned == 0).to_string()
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_retrieval_candidate_chunks", METRICS_PREFIX)).set(candidate_chunks as f64);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, chars: usize, format: &str) {
    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "format" => format.to_string()
    )
    .increment(1);

    counter!(
        format!("{}_document_chars_total", METRICS_PREFIX),
        "format" => format.to_string()
    )
    .increment(chars as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record chat model metrics
pub fn record_model_call(duration_secs: f64, model: &str, mode: &str, tokens: u32, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_model_calls_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "mode" => mode.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_model_call_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);

    if success {
        counter!(
            format!("{}_model_tokens_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(u64::from(tokens));
    }
}

/// Helper to record how much history survived truncation
pub fn record_truncation(kept: usize, dropped: usize) {
    counter!(format!("{}_context_messages_kept_total", METRICS_PREFIX)).increment(kept as u64);
    counter!(format!("{}_context_messages_dropped_total", METRICS_PREFIX)).increment(dropped as u64);
}
