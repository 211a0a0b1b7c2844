#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bookstore_rs::{
    create_app,
    models::Product,
    observability::Metrics,
    repositories::{InMemoryCartRepository, InMemoryProductRepository, ProductRepository},
    services::{CartService, CatalogService},
};
use reqwest::Client;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;

/// Scan page size for the seeded store, small enough that category scans span pages
pub const TEST_PAGE_SIZE: usize = 2;

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub products: Arc<InMemoryProductRepository>,
    pub metrics: Arc<Metrics>,
}

/// Seed catalog. Featured id "7" is deliberately absent.
pub fn seed_books() -> Vec<Product> {
    vec![
        Product::book(
            "1",
            "Pride and Prejudice",
            "Jane Austen",
            dec!(12.99),
            "https://example.com/pride.jpg",
            "classics",
        ),
        Product::book(
            "2",
            "Jane Eyre",
            "Charlotte Bronte",
            dec!(10.49),
            "https://example.com/eyre.jpg",
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
        Product::book(
            "4",
            "Middlemarch",
            "George Eliot",
            dec!(14.25),
            "https://example.com/middlemarch.jpg",
            "classics",
        ),
        Product::book(
            "8",
            "A Brief History of Time",
            "Stephen Hawking",
            dec!(18.00),
            "https://example.com/time.jpg",
            "science",
        ),
        Product::book(
            "11",
            "The Hobbit",
            "J.R.R. Tolkien",
            dec!(14.99),
            "https://example.com/hobbit.jpg",
            "fantasy",
        ),
        Product::book(
            "12",
            "Emma",
            "Jane Austen",
            dec!(11.00),
            "https://example.com/emma.jpg",
            "classics",
        ),
    ]
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let products = Arc::new(InMemoryProductRepository::with_page_size(TEST_PAGE_SIZE));
        for book in seed_books() {
            products.put(book).await.expect("Failed to seed product");
        }

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let catalog_service = Arc::new(CatalogService::new(products.clone()));
        let cart_service = Arc::new(
            CartService::new(Arc::new(InMemoryCartRepository::new()), products.clone())
                .with_metrics(metrics.clone()),
        );
        let app = create_app(catalog_service, cart_service, metrics.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
            products,
            metrics,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
