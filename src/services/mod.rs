// Services module - business logic layer

pub mod cart_service;
pub mod catalog_service;

pub use cart_service::{CartService, DEFAULT_CART_ID};
pub use catalog_service::{CatalogService, FEATURED_PRODUCT_IDS};
