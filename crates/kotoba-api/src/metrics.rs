//! Prometheus metrics for monitoring API performance and review throughput.

use std::sync::LazyLock;
use std::time::Instant;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use kotoba_srs::{Rating, Stage};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("http_request_duration_seconds".to_string()),
        &[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ],
    )?;

    let handle = builder.install_recorder()?;
    Ok(handle)
}

/// Middleware recording request counts and durations per normalized path.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response: Response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(duration);

    response
}

/// Replace UUIDs and numeric IDs with placeholders so paths stay
/// low-cardinality.
fn normalize_path(path: &str) -> String {
    static UUID_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("uuid regex")
    });
    static NUMBER_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"/\d+").expect("number regex"));

    let normalized = UUID_RE.replace_all(path, ":id");
    NUMBER_RE.replace_all(&normalized, "/:id").into_owned()
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// Count a graded review by rating and resulting stage.
pub fn record_review_graded(rating: Rating, stage: Stage) {
    counter!(
        "reviews_graded_total",
        "rating" => rating.as_str(),
        "stage" => stage.as_str()
    )
    .increment(1);
}

/// Count a review submission that exhausted its conflict retries.
pub fn record_review_conflict() {
    counter!("review_conflicts_total").increment(1);
}

/// Publish the number of reviews currently due across all users.
pub fn set_due_backlog(count: i64) {
    gauge!("srs_due_items").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/reviews/550e8400-e29b-41d4-a716-446655440000/661f9511-f3ac-52e5-b827-557766551111"),
            "/reviews/:id/:id"
        );
        assert_eq!(
            normalize_path("/sessions/550e8400-e29b-41d4-a716-446655440000/lessons"),
            "/sessions/:id/lessons"
        );
        assert_eq!(normalize_path("/items/42"), "/items/:id");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
