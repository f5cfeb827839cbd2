//! # Prometheus Metrics
//!
//! Counters for token issuance and validation plus downstream call
//! latency, registered in a dedicated registry with the `txnwrap` prefix
//! and served at `/metrics` on the metrics port.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// All metric handles for the gateway. Cloning shares the underlying metrics.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// New tokens written to the store.
    pub tokens_issued_total: IntCounter,
    /// Issuance calls answered with an existing fresh token.
    pub tokens_reused_total: IntCounter,
    /// Validation attempts, from either validation endpoint.
    pub token_validations_total: IntCounter,
    /// Validation attempts that were refused.
    pub token_rejections_total: IntCounter,
    /// Downstream bank validation calls by audit status.
    pub downstream_calls_total: IntCounterVec,
    /// Downstream bank validation latency by audit status.
    pub downstream_latency_seconds: HistogramVec,
}

impl GatewayMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("txnwrap".into()), None)
            .expect("failed to create prometheus registry");

        let tokens_issued_total =
            IntCounter::new("tokens_issued_total", "Total number of newly issued tokens")
                .expect("metric creation");
        registry
            .register(Box::new(tokens_issued_total.clone()))
            .expect("metric registration");

        let tokens_reused_total = IntCounter::new(
            "tokens_reused_total",
            "Total number of issuance calls that returned an existing token",
        )
        .expect("metric creation");
        registry
            .register(Box::new(tokens_reused_total.clone()))
            .expect("metric registration");

        let token_validations_total = IntCounter::new(
            "token_validations_total",
            "Total number of token validation attempts",
        )
        .expect("metric creation");
        registry
            .register(Box::new(token_validations_total.clone()))
            .expect("metric registration");

        let token_rejections_total = IntCounter::new(
            "token_rejections_total",
            "Total number of refused token validations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(token_rejections_total.clone()))
            .expect("metric registration");

        let downstream_calls_total = IntCounterVec::new(
            Opts::new(
                "downstream_calls_total",
                "Total number of bank validation calls by outcome",
            ),
            &["status"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(downstream_calls_total.clone()))
            .expect("metric registration");

        let downstream_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "downstream_latency_seconds",
                "Bank validation call latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["status"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(downstream_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            tokens_issued_total,
            tokens_reused_total,
            token_validations_total,
            token_rejections_total,
            downstream_calls_total,
            downstream_latency_seconds,
        }
    }

    /// Record the outcome of one validation attempt.
    pub fn record_validation(&self, accepted: bool) {
        self.token_validations_total.inc();
        if !accepted {
            self.token_rejections_total.inc();
        }
    }

    /// Record one downstream call.
    pub fn record_downstream(&self, status: &str, elapsed_secs: f64) {
        self.downstream_calls_total.with_label_values(&[status]).inc();
        self.downstream_latency_seconds
            .with_label_values(&[status])
            .observe(elapsed_secs);
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<GatewayMetrics>;

/// Renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_prefixed() {
        let metrics = GatewayMetrics::new();
        metrics.tokens_issued_total.inc();
        metrics.record_validation(false);
        metrics.record_downstream("SUCCESS", 0.2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("txnwrap_tokens_issued_total 1"));
        assert!(text.contains("txnwrap_token_validations_total 1"));
        assert!(text.contains("txnwrap_token_rejections_total 1"));
        assert!(text.contains(r#"txnwrap_downstream_calls_total{status="SUCCESS"} 1"#));
        assert!(text.contains("txnwrap_downstream_latency_seconds_bucket"));
    }

    #[test]
    fn accepted_validation_is_not_a_rejection() {
        let metrics = GatewayMetrics::new();
        metrics.record_validation(true);
        assert_eq!(metrics.token_validations_total.get(), 1);
        assert_eq!(metrics.token_rejections_total.get(), 0);
    }
}
