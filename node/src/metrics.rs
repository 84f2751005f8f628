//! # Prometheus Metrics
//!
//! Exposes operational metrics for the ledger service. Scraped by
//! Prometheus at the `/metrics` endpoint on the API port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the service.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total transaction submissions admitted (new transactions created).
    pub submissions_total: IntCounter,
    /// Submissions absorbed by the idempotency index (same key replayed).
    pub duplicates_replayed_total: IntCounter,
    /// Transactions settled as completed.
    pub transactions_completed_total: IntCounter,
    /// Transactions settled as failed.
    pub transactions_failed_total: IntCounter,
    /// Transactions cancelled before settlement.
    pub transactions_cancelled_total: IntCounter,
    /// Submissions denied by the verification gate (KYC or role).
    pub authorization_denied_total: IntCounter,
    /// Submissions rejected for insufficient funds.
    pub insufficient_funds_total: IntCounter,
    /// Wallets created.
    pub wallets_created_total: IntCounter,
    /// Transactions currently pending settlement.
    pub pending_transactions: IntGauge,
    /// Histogram of submission handling latency in seconds.
    pub submission_latency_seconds: Histogram,
}

impl LedgerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("vela".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }

        let submissions_total = counter(
            &registry,
            "submissions_total",
            "Total transaction submissions admitted",
        );
        let duplicates_replayed_total = counter(
            &registry,
            "duplicates_replayed_total",
            "Submissions absorbed by the idempotency index",
        );
        let transactions_completed_total = counter(
            &registry,
            "transactions_completed_total",
            "Transactions settled as completed",
        );
        let transactions_failed_total = counter(
            &registry,
            "transactions_failed_total",
            "Transactions settled as failed",
        );
        let transactions_cancelled_total = counter(
            &registry,
            "transactions_cancelled_total",
            "Transactions cancelled before settlement",
        );
        let authorization_denied_total = counter(
            &registry,
            "authorization_denied_total",
            "Submissions denied by KYC or role policy",
        );
        let insufficient_funds_total = counter(
            &registry,
            "insufficient_funds_total",
            "Submissions rejected for insufficient funds",
        );
        let wallets_created_total = counter(
            &registry,
            "wallets_created_total",
            "Wallets created",
        );

        let pending_transactions = IntGauge::new(
            "pending_transactions",
            "Transactions currently pending settlement",
        )
        .expect("metric creation");
        registry
            .register(Box::new(pending_transactions.clone()))
            .expect("metric registration");

        let submission_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "submission_latency_seconds",
                "Submission handling latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(submission_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            submissions_total,
            duplicates_replayed_total,
            transactions_completed_total,
            transactions_failed_total,
            transactions_cancelled_total,
            authorization_denied_total,
            insufficient_funds_total,
            wallets_created_total,
            pending_transactions,
            submission_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<LedgerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<crate::api::AppState>,
) -> impl IntoResponse {
    match state.metrics.encode() {
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
