//! Prometheus metrics for the rewrite layer.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Metrics live in the global default registry and are registered lazily,
//! once per process, however many routers get built.

use once_cell::sync::Lazy;
use prometheus::{
    opts, register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

/// What the rewrite layer did with one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Tokens were substituted into the body.
    Rewritten,
    /// Not eligible (status, content type, encoding) or nothing to replace.
    Passthrough,
    /// Eligible, but rewriting failed and the original body was sent.
    Fallback,
    /// Eligible, but larger than the rewrite buffer limit.
    Oversize,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Rewritten => "rewritten",
            Outcome::Passthrough => "passthrough",
            Outcome::Fallback => "fallback",
            Outcome::Oversize => "oversize",
        }
    }
}

static RESPONSES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!(
            "content_tokens_responses_total",
            "Responses seen by the token rewrite layer, by outcome"
        ),
        &["outcome"]
    )
    .expect("failed to register content_tokens_responses_total")
});

static MARKERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        opts!(
            "content_tokens_markers_total",
            "Distinct markers per substitution pass, by resolution result"
        ),
        &["result"]
    )
    .expect("failed to register content_tokens_markers_total")
});

static REWRITE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(prometheus::histogram_opts!(
        "content_tokens_rewrite_duration_seconds",
        "Time spent buffering and rewriting one response body",
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]
    ))
    .expect("failed to register content_tokens_rewrite_duration_seconds")
});

pub fn record_outcome(outcome: Outcome) {
    RESPONSES_TOTAL.with_label_values(&[outcome.as_str()]).inc();
}

pub fn record_markers(resolved: usize, unresolved: usize) {
    if resolved > 0 {
        MARKERS_TOTAL
            .with_label_values(&["resolved"])
            .inc_by(resolved as f64);
    }
    if unresolved > 0 {
        MARKERS_TOTAL
            .with_label_values(&["unresolved"])
            .inc_by(unresolved as f64);
    }
}

pub fn observe_rewrite_seconds(secs: f64) {
    REWRITE_DURATION.observe(secs);
}

/// Encode all registered metrics as Prometheus text format.
/// Called by the `/metrics` HTTP handler.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────
