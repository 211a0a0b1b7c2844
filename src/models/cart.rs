use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Product, ServiceError, ServiceResult};

/// Shopping cart held in process memory
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    pub cart_id: String,
    pub items: Vec<CartLineItem>,
}

/// A single product entry in a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: String,
    pub name: String,
    pub author: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i64,
    pub image_url: String,
}

/// Request body for `POST /api/cart/add`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Request body for `POST /api/cart/update`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub item_id: String,
    pub quantity: i64,
}

/// Acknowledgement returned by every cart mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

fn default_quantity() -> i64 {
    1
}

impl CartLineItem {
    /// Build a line item from a stored product.
    ///
    /// Fails when the product record lacks any attribute a line item displays.
    pub fn from_product(product: &Product, quantity: i64) -> ServiceResult<Self> {
        let missing = |field: &str| ServiceError::IncompleteProduct {
            id: product.id.clone(),
            field: field.to_string(),
        };

        Ok(Self {
            id: product.id.clone(),
            name: product.name.clone().ok_or_else(|| missing("name"))?,
            author: product.author.clone().ok_or_else(|| missing("author"))?,
            price: product.price.ok_or_else(|| missing("price"))?,
            quantity,
            image_url: product
                .image_url
                .clone()
                .ok_or_else(|| missing("imageUrl"))?,
        })
    }
}

impl Cart {
    /// Create a new empty cart
    pub fn new(cart_id: String) -> Self {
        Self {
            cart_id,
            items: Vec::new(),
        }
    }

    /// Add a line item, or grow the quantity of the existing one with the same id
    pub fn add_item(&mut self, line_item: CartLineItem) -> ServiceResult<()> {
        if !self.increment_item(&line_item.id, line_item.quantity)? {
            self.items.push(line_item);
        }
        Ok(())
    }

    /// Grow the quantity of an existing line item. Returns false if absent.
    ///
    /// A total outside the `i64` range is rejected and leaves the item unchanged.
    pub fn increment_item(&mut self, item_id: &str, quantity: i64) -> ServiceResult<bool> {
        let Some(item) = self.items.iter_mut().find(|item| item.id == item_id) else {
            return Ok(false);
        };

        item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
            ServiceError::ValidationError {
                message: format!("Quantity for item {} is out of range", item_id),
            }
        })?;
        Ok(true)
    }

    /// Overwrite the quantity of a line item. Returns false if absent.
    pub fn set_item_quantity(&mut self, item_id: &str, quantity: i64) -> bool {
        match self.items.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line item
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let original_len = self.items.len();
        self.items.retain(|item| item.id != item_id);
        self.items.len() != original_len
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn line_item(id: &str, quantity: i64, price: Decimal) -> CartLineItem {
        CartLineItem {
            id: id.to_string(),
            name: format!("Book {}", id),
            author: "Anonymous".to_string(),
            price,
            quantity,
            image_url: format!("{}.jpg", id),
        }
    }

    fn quantity_of(cart: &Cart, id: &str) -> Option<i64> {
        cart.items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.quantity)
    }

    #[test]
    fn test_add_item_merges_by_id() {
        let mut cart = Cart::new("default".to_string());
        cart.add_item(line_item("1", 2, dec!(12.99))).unwrap();
        cart.add_item(line_item("1", 2, dec!(12.99))).unwrap();
        cart.add_item(line_item("2", 1, dec!(5.00))).unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(quantity_of(&cart, "1"), Some(4));
        assert_eq!(quantity_of(&cart, "2"), Some(1));
    }

    #[test]
    fn test_increment_rejects_quantity_overflow() {
        let mut cart = Cart::new("default".to_string());
        cart.add_item(line_item("1", i64::MAX, dec!(12.99))).unwrap();

        match cart.increment_item("1", 1) {
            Err(ServiceError::ValidationError { message }) => {
                assert!(message.contains("out of range"))
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
        assert_eq!(quantity_of(&cart, "1"), Some(i64::MAX));

        assert!(cart.add_item(line_item("1", 1, dec!(12.99))).is_err());
        assert!(cart.increment_item("1", i64::MIN).unwrap());
        assert_eq!(quantity_of(&cart, "1"), Some(-1));
    }

    #[test]
    fn test_increment_missing_item() {
        let mut cart = Cart::new("default".to_string());
        assert!(!cart.increment_item("1", 3).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_and_remove_item() {
        let mut cart = Cart::new("default".to_string());
        cart.add_item(line_item("1", 1, dec!(3.50))).unwrap();

        assert!(cart.set_item_quantity("1", 7));
        assert_eq!(quantity_of(&cart, "1"), Some(7));
        assert!(!cart.set_item_quantity("missing", 7));

        assert!(!cart.remove_item("missing"));
        assert!(cart.remove_item("1"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_is_not_validated() {
        let mut cart = Cart::new("default".to_string());
        cart.add_item(line_item("1", 1, dec!(3.50))).unwrap();

        assert!(cart.set_item_quantity("1", -3));
        assert_eq!(quantity_of(&cart, "1"), Some(-3));
    }

    #[test]
    fn test_line_item_from_incomplete_product() {
        let mut product = Product::new("9");
        product.name = Some("Untitled".to_string());

        match CartLineItem::from_product(&product, 1) {
            Err(ServiceError::IncompleteProduct { id, field }) => {
                assert_eq!(id, "9");
                assert_eq!(field, "author");
            }
            other => panic!("Expected IncompleteProduct, got {:?}", other),
        }
    }

    #[test]
    fn test_line_item_wire_format() {
        let item = line_item("1", 2, dec!(12.99));
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "1",
                "name": "Book 1",
                "author": "Anonymous",
                "price": 12.99,
                "quantity": 2,
                "imageUrl": "1.jpg"
            })
        );
    }

    #[test]
    fn test_add_request_defaults_quantity() {
        let request: AddToCartRequest = serde_json::from_str(r#"{"productId": "1"}"#).unwrap();
        assert_eq!(request.product_id, "1");
        assert_eq!(request.quantity, 1);
    }

    #[test]
    fn test_update_request_requires_quantity() {
        let result = serde_json::from_str::<UpdateCartRequest>(r#"{"itemId": "1"}"#);
        assert!(result.is_err());
    }
}
