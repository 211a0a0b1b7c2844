use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::models::{Cart, CartLineItem, ServiceError, ServiceResult};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::{CartRepository, ProductRepository};

/// Cart used when a request does not name one
pub const DEFAULT_CART_ID: &str = "default";

/// Service for managing shopping carts
pub struct CartService {
    cart_repository: Arc<dyn CartRepository>,
    product_repository: Arc<dyn ProductRepository>,
    // Serializes load-modify-save sequences so mutations apply whole
    mutation_lock: Mutex<()>,
    business_tracer: Option<BusinessTracingMiddleware>,
}

impl CartService {
    pub fn new(
        cart_repository: Arc<dyn CartRepository>,
        product_repository: Arc<dyn ProductRepository>,
    ) -> Self {
        Self {
            cart_repository,
            product_repository,
            mutation_lock: Mutex::new(()),
            business_tracer: None,
        }
    }

    /// Record cart operation outcomes in the `cart_operations_total` metrics
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.business_tracer = Some(BusinessTracingMiddleware::new(metrics));
        self
    }

    async fn observe<F, T>(&self, operation: &str, cart_id: &str, future: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        match &self.business_tracer {
            Some(tracer) => tracer.trace_cart_operation(operation, cart_id, future).await,
            None => future.await,
        }
    }

    async fn load_cart(&self, cart_id: &str) -> ServiceResult<Cart> {
        Ok(self
            .cart_repository
            .find_cart(cart_id)
            .await?
            .unwrap_or_else(|| Cart::new(cart_id.to_string())))
    }

    /// Current line items. A cart that was never used is empty.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: &str) -> ServiceResult<Vec<CartLineItem>> {
        let cart = self.load_cart(cart_id).await?;
        Ok(cart.items)
    }

    /// Add `quantity` of a product, growing the existing line item if there is one.
    ///
    /// The product must exist in the store even when it is already in the cart.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> ServiceResult<()> {
        self.observe("add", cart_id, self.apply_add(cart_id, product_id, quantity))
            .await
    }

    /// Overwrite the quantity of a line item already in the cart
    #[instrument(skip(self))]
    pub async fn update_cart(&self, cart_id: &str, item_id: &str, quantity: i64) -> ServiceResult<()> {
        self.observe("update", cart_id, self.apply_update(cart_id, item_id, quantity))
            .await
    }

    /// Remove a line item. Removing an item that is not in the cart succeeds.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, cart_id: &str, item_id: &str) -> ServiceResult<()> {
        self.observe("remove", cart_id, self.apply_remove(cart_id, item_id))
            .await
    }

    /// Empty the cart. No order is recorded.
    #[instrument(skip(self))]
    pub async fn checkout(&self, cart_id: &str) -> ServiceResult<()> {
        self.observe("checkout", cart_id, self.apply_checkout(cart_id))
            .await
    }

    async fn apply_add(&self, cart_id: &str, product_id: &str, quantity: i64) -> ServiceResult<()> {
        let product = self
            .product_repository
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound {
                id: product_id.to_string(),
            })?;

        let _guard = self.mutation_lock.lock().await;
        let mut cart = self.load_cart(cart_id).await?;

        if !cart.increment_item(product_id, quantity)? {
            cart.add_item(CartLineItem::from_product(&product, quantity)?)?;
        }

        self.cart_repository.save_cart(cart).await?;
        crate::info_with_trace!(
            product_id = %product_id,
            quantity = quantity,
            "Item added to cart"
        );
        Ok(())
    }

    async fn apply_update(&self, cart_id: &str, item_id: &str, quantity: i64) -> ServiceResult<()> {
        let _guard = self.mutation_lock.lock().await;
        let mut cart = self.load_cart(cart_id).await?;

        if !cart.set_item_quantity(item_id, quantity) {
            return Err(ServiceError::CartItemNotFound {
                item_id: item_id.to_string(),
            });
        }

        self.cart_repository.save_cart(cart).await?;
        Ok(())
    }

    async fn apply_remove(&self, cart_id: &str, item_id: &str) -> ServiceResult<()> {
        let _guard = self.mutation_lock.lock().await;
        let mut cart = self.load_cart(cart_id).await?;

        if !cart.remove_item(item_id) {
            return Ok(());
        }

        // A cart with no items is not retained
        if cart.is_empty() {
            self.cart_repository.delete_cart(cart_id).await?;
        } else {
            self.cart_repository.save_cart(cart).await?;
        }
        Ok(())
    }

    async fn apply_checkout(&self, cart_id: &str) -> ServiceResult<()> {
        let _guard = self.mutation_lock.lock().await;
        self.cart_repository.delete_cart(cart_id).await?;
        info!("Cart checked out");
        Ok(())
    }
}
