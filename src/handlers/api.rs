use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, instrument};

use crate::models::{
    AddToCartRequest, CartLineItem, Category, Product, ServiceError, SuccessResponse,
    UpdateCartRequest,
};
use crate::services::{CartService, CatalogService, DEFAULT_CART_ID};

/// Request header selecting which cart a cart route operates on
pub const CART_ID_HEADER: &str = "x-cart-id";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

/// Shared application state containing all services
#[derive(Clone)]
pub struct ApiState {
    pub catalog_service: Arc<CatalogService>,
    pub cart_service: Arc<CartService>,
}

/// Cart named by the `X-Cart-Id` header, or the shared default cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CartId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cart_id = parts
            .headers
            .get(CART_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CART_ID);

        Ok(CartId(cart_id.to_string()))
    }
}

/// Create API router with all endpoints
pub fn create_api_router(
    catalog_service: Arc<CatalogService>,
    cart_service: Arc<CartService>,
) -> Router {
    let state = ApiState {
        catalog_service,
        cart_service,
    };

    Router::new()
        // Catalog endpoints (read-only)
        .route("/api/categories", get(list_categories))
        .route("/api/categories/:category_id", get(get_category))
        .route(
            "/api/categories/:category_id/products",
            get(list_category_products),
        )
        .route("/api/products/featured", get(get_featured_products))
        .route("/api/products/:product_id", get(get_product))
        // Cart endpoints
        .route("/api/cart", get(get_cart))
        .route("/api/cart/add", post(add_to_cart))
        .route("/api/cart/update", post(update_cart))
        .route("/api/cart/remove/:item_id", delete(remove_from_cart))
        .route("/api/cart/checkout", post(checkout))
        .with_state(state)
}

// =============================================================================
// CATALOG ENDPOINTS
// =============================================================================

#[instrument(name = "list_categories", skip(state))]
pub async fn list_categories(State(state): State<ApiState>) -> Json<Vec<Category>> {
    Json(state.catalog_service.list_categories())
}

#[instrument(name = "get_category", skip(state), fields(category_id = %category_id))]
pub async fn get_category(
    State(state): State<ApiState>,
    Path(category_id): Path<String>,
) -> ApiResult<Category> {
    state
        .catalog_service
        .get_category(&category_id)
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "list_category_products", skip(state), fields(category_id = %category_id))]
pub async fn list_category_products(
    State(state): State<ApiState>,
    Path(category_id): Path<String>,
) -> ApiResult<Vec<Product>> {
    state
        .catalog_service
        .list_products_by_category(&category_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "get_featured_products", skip(state))]
pub async fn get_featured_products(State(state): State<ApiState>) -> ApiResult<Vec<Product>> {
    state
        .catalog_service
        .get_featured_products()
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "get_product", skip(state), fields(product_id = %product_id))]
pub async fn get_product(
    State(state): State<ApiState>,
    Path(product_id): Path<String>,
) -> ApiResult<Product> {
    state
        .catalog_service
        .get_product(&product_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

// =============================================================================
// CART ENDPOINTS
// =============================================================================

#[instrument(name = "get_cart", skip(state), fields(cart_id = %cart_id.0))]
pub async fn get_cart(
    State(state): State<ApiState>,
    cart_id: CartId,
) -> ApiResult<Vec<CartLineItem>> {
    state
        .cart_service
        .get_cart(&cart_id.0)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "add_to_cart", skip(state, payload), fields(cart_id = %cart_id.0))]
pub async fn add_to_cart(
    State(state): State<ApiState>,
    cart_id: CartId,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse> {
    let Json(request) = payload.map_err(rejection_to_response)?;

    state
        .cart_service
        .add_to_cart(&cart_id.0, &request.product_id, request.quantity)
        .await
        .map(|_| Json(SuccessResponse::ok()))
        .map_err(service_error_to_response)
}

#[instrument(name = "update_cart", skip(state, payload), fields(cart_id = %cart_id.0))]
pub async fn update_cart(
    State(state): State<ApiState>,
    cart_id: CartId,
    payload: Result<Json<UpdateCartRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse> {
    let Json(request) = payload.map_err(rejection_to_response)?;

    state
        .cart_service
        .update_cart(&cart_id.0, &request.item_id, request.quantity)
        .await
        .map(|_| Json(SuccessResponse::ok()))
        .map_err(service_error_to_response)
}

#[instrument(name = "remove_from_cart", skip(state), fields(cart_id = %cart_id.0, item_id = %item_id))]
pub async fn remove_from_cart(
    State(state): State<ApiState>,
    cart_id: CartId,
    Path(item_id): Path<String>,
) -> ApiResult<SuccessResponse> {
    state
        .cart_service
        .remove_from_cart(&cart_id.0, &item_id)
        .await
        .map(|_| Json(SuccessResponse::ok()))
        .map_err(service_error_to_response)
}

#[instrument(name = "checkout", skip(state), fields(cart_id = %cart_id.0))]
pub async fn checkout(State(state): State<ApiState>, cart_id: CartId) -> ApiResult<SuccessResponse> {
    state
        .cart_service
        .checkout(&cart_id.0)
        .await
        .map(|_| Json(SuccessResponse::ok()))
        .map_err(service_error_to_response)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn error_body(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

/// Convert service errors to HTTP responses
pub fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    match err {
        ServiceError::CategoryNotFound { .. } => {
            error_body(StatusCode::NOT_FOUND, "Category not found")
        }
        ServiceError::ProductNotFound { .. } => {
            error_body(StatusCode::NOT_FOUND, "Product not found")
        }
        ServiceError::CartItemNotFound { .. } => {
            error_body(StatusCode::NOT_FOUND, "Item not found in cart")
        }
        ServiceError::ValidationError { message } => {
            error_body(StatusCode::BAD_REQUEST, message)
        }
        err @ (ServiceError::IncompleteProduct { .. } | ServiceError::Repository { .. }) => {
            error!("Request failed: {}", err);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn rejection_to_response(rejection: JsonRejection) -> (StatusCode, Json<Value>) {
    crate::warn_with_trace!("Rejected request body: {}", rejection.body_text());
    error_body(StatusCode::BAD_REQUEST, rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryError;
    use crate::repositories::{InMemoryCartRepository, InMemoryProductRepository};
    use axum::{
        body::Body,
        http::{header, Method, Request},
        response::Response,
    };
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn create_test_router() -> Router {
        let products = Arc::new(InMemoryProductRepository::with_products(vec![
            Product::book(
                "1",
                "Pride and Prejudice",
                "Jane Austen",
                dec!(12.99),
                "https://example.com/pride.jpg",
                "classics",
            ),
            Product::book(
                "3",
                "Leaves of Grass",
                "Walt Whitman",
                dec!(9.50),
                "https://example.com/grass.jpg",
                "poetry",
            ),
        ]));
        let carts = Arc::new(InMemoryCartRepository::new());

        create_api_router(
            Arc::new(CatalogService::new(products.clone())),
            Arc::new(CartService::new(carts, products)),
        )
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_category_not_found() {
        let request = Request::builder()
            .uri("/api/categories/nope")
            .body(Body::empty())
            .unwrap();

        let response = create_test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Category not found"})
        );
    }

    #[tokio::test]
    async fn test_get_product_is_json() {
        let request = Request::builder()
            .uri("/api/products/1")
            .body(Body::empty())
            .unwrap();

        let response = create_test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["price"], json!(12.99));
        assert_eq!(body["categoryId"], json!("classics"));
    }

    #[tokio::test]
    async fn test_add_to_cart_without_product_id() {
        let request = json_request(Method::POST, "/api/cart/add", r#"{"quantity": 2}"#);

        let response = create_test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_add_to_cart_with_malformed_body() {
        let request = json_request(Method::POST, "/api/cart/add", "{not json");

        let response = create_test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_past_quantity_range_is_bad_request() {
        let router = create_test_router();
        let body = format!(r#"{{"productId": "1", "quantity": {}}}"#, i64::MAX);

        let response = router
            .clone()
            .oneshot(json_request(Method::POST, "/api/cart/add", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(json_request(Method::POST, "/api/cart/add", r#"{"productId": "1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Quantity for item 1 is out of range"})
        );

        let cart = Request::builder()
            .uri("/api/cart")
            .body(Body::empty())
            .unwrap();
        let items = body_json(router.oneshot(cart).await.unwrap()).await;
        assert_eq!(items[0]["quantity"], json!(i64::MAX));
    }

    #[tokio::test]
    async fn test_update_missing_cart_item() {
        let request = json_request(
            Method::POST,
            "/api/cart/update",
            r#"{"itemId": "1", "quantity": 3}"#,
        );

        let response = create_test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Item not found in cart"})
        );
    }

    #[tokio::test]
    async fn test_cart_id_header_selects_cart() {
        let router = create_test_router();

        let mut add = json_request(Method::POST, "/api/cart/add", r#"{"productId": "3"}"#);
        add.headers_mut()
            .insert(CART_ID_HEADER, "alice".parse().unwrap());
        let response = router.clone().oneshot(add).await.unwrap();
        assert_eq!(body_json(response).await, json!({"success": true}));

        let alice = Request::builder()
            .uri("/api/cart")
            .header(CART_ID_HEADER, "alice")
            .body(Body::empty())
            .unwrap();
        let items = body_json(router.clone().oneshot(alice).await.unwrap()).await;
        assert_eq!(items[0]["quantity"], json!(1));
        assert_eq!(items[0]["price"], json!(9.5));

        let shared = Request::builder()
            .uri("/api/cart")
            .body(Body::empty())
            .unwrap();
        let items = body_json(router.oneshot(shared).await.unwrap()).await;
        assert_eq!(items, json!([]));
    }

    #[test]
    fn test_service_error_mapping() {
        let (status, Json(body)) = service_error_to_response(ServiceError::ProductNotFound {
            id: "9".to_string(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Product not found"}));

        let (status, Json(body)) = service_error_to_response(ServiceError::ValidationError {
            message: "bad quantity".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "bad quantity"}));

        let (status, Json(body)) = service_error_to_response(
            RepositoryError::AwsSdk {
                message: "throttled".to_string(),
            }
            .into(),
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_cart_id_defaults_when_header_blank() {
        let request = Request::builder()
            .header(CART_ID_HEADER, "   ")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let CartId(cart_id) = CartId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(cart_id, DEFAULT_CART_ID);
    }
}
