//! HTTP request tracking middleware for observability
//!
//! Endpoint labels use the matched route template (e.g.
//! `/api/insights/{student_id}`), so raw ids never reach Prometheus and
//! label cardinality stays bounded by the route table.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Label for requests that matched no route (404s against unknown paths)
const UNMATCHED: &str = "unmatched";

/// Middleware to track HTTP request latency and counts
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    crate::metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &endpoint, &status])
        .observe(duration);

    crate::metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &endpoint, &status])
        .inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "ok"
    }

    fn app() -> Router {
        Router::new()
            .route("/api/insights/{student_id}", get(ok))
            .layer(axum::middleware::from_fn(track_metrics))
    }

    #[tokio::test]
    async fn records_route_template_not_raw_path() {
        let counter = crate::metrics::HTTP_REQUESTS_TOTAL
            .get_metric_with_label_values(&["GET", "/api/insights/{student_id}", "200"])
            .unwrap();
        let before = counter.get();

        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/insights/stu-042")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(counter.get(), before + 1);

        // The raw path never becomes a label
        let raw = crate::metrics::HTTP_REQUESTS_TOTAL
            .get_metric_with_label_values(&["GET", "/api/insights/stu-042", "200"])
            .unwrap();
        assert_eq!(raw.get(), 0);
    }

    #[tokio::test]
    async fn unmatched_requests_share_one_label() {
        let counter = crate::metrics::HTTP_REQUESTS_TOTAL
            .get_metric_with_label_values(&["GET", UNMATCHED, "404"])
            .unwrap();
        let before = counter.get();

        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/no/such/route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(counter.get(), before + 1);
    }
}
