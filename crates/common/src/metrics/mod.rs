//! Metrics and observability utilities
//!
//! Prometheus metrics for the editorial workflow with a shared
//! naming prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all journal portal metrics
pub const METRICS_PREFIX: &str = "journal";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s - uploads
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
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

    // Submission metrics
    describe_counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Total manuscripts submitted"
    );

    describe_counter!(
        format!("{}_revisions_total", METRICS_PREFIX),
        Unit::Count,
        "Total revised versions uploaded"
    );

    describe_counter!(
        format!("{}_upload_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Total bytes written to object storage"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_status_changes_total", METRICS_PREFIX),
        Unit::Count,
        "Manuscript status transitions"
    );

    describe_counter!(
        format!("{}_reviewer_assignments_total", METRICS_PREFIX),
        Unit::Count,
        "Reviewer assignment requests"
    );

    describe_counter!(
        format!("{}_review_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Review decisions recorded"
    );

    // Publication metrics
    describe_counter!(
        format!("{}_issues_published_total", METRICS_PREFIX),
        Unit::Count,
        "Issues compiled and published"
    );

    describe_counter!(
        format!("{}_articles_published_total", METRICS_PREFIX),
        Unit::Count,
        "Articles created by publication"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Notification deliveries by channel and outcome"
    );

    // File access metrics
    describe_counter!(
        format!("{}_signed_urls_total", METRICS_PREFIX),
        Unit::Count,
        "Signed download URLs issued"
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

/// A new manuscript with its first version
pub fn record_submission(size_bytes: usize, with_source_document: bool) {
    counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        "source_document" => with_source_document.to_string()
    )
    .increment(1);

    counter!(format!("{}_upload_bytes_total", METRICS_PREFIX)).increment(size_bytes as u64);
}

pub fn record_revision(size_bytes: usize) {
    counter!(format!("{}_revisions_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_upload_bytes_total", METRICS_PREFIX)).increment(size_bytes as u64);
}

pub fn record_status_change(status: &str) {
    counter!(
        format!("{}_status_changes_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// `created` is false when the pair was already assigned
pub fn record_assignment(created: bool) {
    let outcome = if created { "created" } else { "existing" };
    counter!(
        format!("{}_reviewer_assignments_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_decision(recommendation: &str) {
    counter!(
        format!("{}_review_decisions_total", METRICS_PREFIX),
        "recommendation" => recommendation.to_string()
    )
    .increment(1);
}

pub fn record_issue_published(article_count: usize) {
    counter!(format!("{}_issues_published_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_articles_published_total", METRICS_PREFIX))
        .increment(article_count as u64);
}

/// `channel` is `in_app` or `email`
pub fn record_notification(channel: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "channel" => channel,
        "status" => status
    )
    .increment(1);
}

pub fn record_signed_url(kind: &str) {
    counter!(
        format!("{}_signed_urls_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper is a no-op
        let metrics = RequestMetrics::start("POST", "/submissions/create");
        metrics.finish(200);
        record_submission(1024, false);
        record_assignment(true);
        record_notification("email", false);
    }
}
