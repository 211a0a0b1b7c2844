use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::models::{Cart, RepositoryResult};

/// Trait defining the interface for cart storage
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Find a cart by its id
    async fn find_cart(&self, cart_id: &str) -> RepositoryResult<Option<Cart>>;

    /// Save a cart (create or replace)
    async fn save_cart(&self, cart: Cart) -> RepositoryResult<Cart>;

    /// Delete a cart. Deleting an unknown cart succeeds.
    async fn delete_cart(&self, cart_id: &str) -> RepositoryResult<()>;
}

/// Carts held in process memory for the lifetime of the service
#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Cart>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_cart(&self, cart_id: &str) -> RepositoryResult<Option<Cart>> {
        Ok(self.carts.read().await.get(cart_id).cloned())
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.cart_id, items = cart.items.len()))]
    async fn save_cart(&self, cart: Cart) -> RepositoryResult<Cart> {
        self.carts
            .write()
            .await
            .insert(cart.cart_id.clone(), cart.clone());
        debug!("Cart saved");
        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn delete_cart(&self, cart_id: &str) -> RepositoryResult<()> {
        if self.carts.write().await.remove(cart_id).is_some() {
            debug!("Cart deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartLineItem, Product};
    use rust_decimal_macros::dec;

    fn create_test_cart(cart_id: &str) -> Cart {
        let product = Product::book(
            "1",
            "Pride and Prejudice",
            "Jane Austen",
            dec!(12.99),
            "https://example.com/pride.jpg",
            "classics",
        );
        let mut cart = Cart::new(cart_id.to_string());
        let line_item = CartLineItem::from_product(&product, 2).unwrap();
        cart.add_item(line_item).unwrap();
        cart
    }

    #[tokio::test]
    async fn test_save_and_find_cart() {
        let repo = InMemoryCartRepository::new();
        repo.save_cart(create_test_cart("alice")).await.unwrap();

        let cart = repo.find_cart("alice").await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);
        assert!(repo.find_cart("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_cart() {
        let repo = InMemoryCartRepository::new();
        repo.save_cart(create_test_cart("alice")).await.unwrap();
        repo.save_cart(Cart::new("alice".to_string())).await.unwrap();

        let cart = repo.find_cart("alice").await.unwrap().unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_delete_cart() {
        let repo = InMemoryCartRepository::new();
        repo.save_cart(create_test_cart("alice")).await.unwrap();

        repo.delete_cart("alice").await.unwrap();
        assert!(repo.find_cart("alice").await.unwrap().is_none());

        // Unknown carts delete cleanly
        repo.delete_cart("nobody").await.unwrap();
    }
}
