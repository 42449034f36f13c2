//! Prometheus metrics for the HTTP API
//!
//! # Available Metrics
//!
//! - `itrack_http_requests_total{method, route, status}` - Counter of handled requests
//! - `itrack_http_request_duration_seconds{method, route}` - Histogram of request latency
//! - `itrack_records{kind}` - Gauge of stored rows per record kind, refreshed on scrape
//!
//! `route` is the matched route template (`/api/systems/{id}`), never the raw
//! path, so label cardinality stays bounded.

use crate::store::RecordCounts;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Histogram bucket boundaries for request latency (in seconds)
const REQUEST_DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    http_requests: Arc<CounterVec>,
    http_duration: Arc<HistogramVec>,
    records: Arc<IntGaugeVec>,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests = CounterVec::new(
            Opts::new("itrack_http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )?;

        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "itrack_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(REQUEST_DURATION_BUCKETS.to_vec()),
            &["method", "route"],
        )?;

        let records = IntGaugeVec::new(
            Opts::new("itrack_records", "Stored records per kind"),
            &["kind"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(records.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            http_requests: Arc::new(http_requests),
            http_duration: Arc::new(http_duration),
            records: Arc::new(records),
        })
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, route, status.as_str()])
            .inc();
        self.http_duration
            .with_label_values(&[method, route])
            .observe(duration_secs);
    }

    pub fn set_record_counts(&self, counts: &RecordCounts) {
        for (kind, count) in counts.by_kind() {
            self.records.with_label_values(&[kind]).set(count);
        }
    }

    /// Encode every registered metric in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(Arc::strong_count(&metrics.registry) >= 1);
    }

    #[test]
    fn test_record_request() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("GET", "/api/systems/{id}", 200, 0.004);
        metrics.record_request("GET", "/api/systems/{id}", 404, 0.001);

        let text = metrics.render().unwrap();
        assert!(text.contains(
            r#"itrack_http_requests_total{method="GET",route="/api/systems/{id}",status="200"} 1"#
        ));
        assert!(text.contains("itrack_http_request_duration_seconds_bucket"));
    }

    #[test]
    fn test_record_gauges() {
        let metrics = Metrics::new().unwrap();
        metrics.set_record_counts(&RecordCounts {
            systems: 12,
            cards: 3,
            ..Default::default()
        });

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"itrack_records{kind="systems"} 12"#));
        assert!(text.contains(r#"itrack_records{kind="cards"} 3"#));
        assert!(text.contains(r#"itrack_records{kind="tasks"} 0"#));
    }
}
