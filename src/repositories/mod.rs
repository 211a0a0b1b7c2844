// Repositories module - data access layer

pub mod cart_repository;
pub mod in_memory_product_repository;
pub mod product_repository;


pub use cart_repository::{CartRepository, InMemoryCartRepository};
pub use in_memory_product_repository::InMemoryProductRepository;
pub use product_repository::{DynamoDbProductRepository, ProductRepository, ProductScan};
