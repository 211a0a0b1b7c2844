use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::{create_api_router, health_check, metrics_handler};
use crate::observability::{observability_middleware, Metrics};
use crate::services::{CartService, CatalogService};

/// Build the full application router: API routes, health, metrics and middleware
pub fn create_app(
    catalog_service: Arc<CatalogService>,
    cart_service: Arc<CartService>,
    metrics: Arc<Metrics>,
) -> Router {
    let metrics_for_middleware = metrics.clone();

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(create_api_router(catalog_service, cart_service))
        // Layers run outer to inner from the bottom up
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
