use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use super::Metrics;

/// Header carrying a caller-supplied correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Endpoint label for requests no route matched
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Middleware for request logging and metrics collection
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .unwrap_or("unknown")
        .trim()
        .to_string();

    // Label by route template so raw paths never become label values
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str())
        .unwrap_or(UNMATCHED_ENDPOINT)
        .to_string();

    let span_name = format!("{} {}", method, endpoint);
    let span = tracing::info_span!(
        target: "bookstore_rs::http",
        "http_request",
        otel.name = %span_name,
        otel.kind = "server",
        request_id = %request_id,
        http.method = %method,
        http.route = %endpoint,
        http.user_agent = %user_agent,
        http.status_code = tracing::field::Empty,
    );

    async {
        metrics.increment_in_flight(&method, &endpoint);

        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            remote_addr = %client_ip,
            user_agent = %user_agent,
            "Request started: {} {}", method, path
        );

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let status_code = response.status().as_u16();

        let current_span = tracing::Span::current();
        current_span.record("http.status_code", status_code);
        if status_code >= 500 {
            current_span
                .context()
                .span()
                .set_status(opentelemetry::trace::Status::error("HTTP server error"));
        }

        metrics.record_http_request(&method, &endpoint, status_code, duration.as_secs_f64());
        metrics.decrement_in_flight(&method, &endpoint);

        if status_code >= 500 {
            error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status_code = status_code,
                duration = duration.as_secs_f64(),
                "Request completed: {} {} {}", method, path, status_code
            );
        } else {
            info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status_code = status_code,
                duration = duration.as_secs_f64(),
                "Request completed: {} {} {}", method, path, status_code
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Times item store calls and records them as database metrics
#[derive(Clone)]
pub struct DatabaseTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl DatabaseTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(skip_all, fields(operation = %operation, table = %table))]
    pub async fn trace_operation<F, T, E>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();
        let result = future.await;
        let duration_seconds = start_time.elapsed().as_secs_f64();

        match &result {
            Ok(_) => {
                self.metrics
                    .record_database_operation(operation, table, true, duration_seconds);
            }
            Err(error) => {
                self.metrics
                    .record_database_operation(operation, table, false, duration_seconds);
                error!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Database operation failed"
                );
            }
        }

        result
    }
}

/// Records business-level outcomes for cart operations
#[derive(Clone)]
pub struct BusinessTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl BusinessTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(skip_all, fields(operation = %operation, cart_id = %cart_id))]
    pub async fn trace_cart_operation<F, T, E>(
        &self,
        operation: &str,
        cart_id: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        match future.await {
            Ok(result) => {
                self.metrics.record_cart_operation(operation, true);
                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation completed successfully"
                );
                Ok(result)
            }
            Err(error) => {
                self.metrics.record_cart_operation(operation, false);
                error!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation failed"
                );
                Err(error)
            }
        }
    }
}
