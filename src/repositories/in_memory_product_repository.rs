use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::ProductRepository;
use crate::models::{Product, RepositoryResult};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Product store held in process memory.
///
/// Scans walk the stored products in pages of `page_size` entries and
/// resume from a continuation offset, the way DynamoDB resumes from
/// `LastEvaluatedKey`. Backs local runs, integration tests and benches.
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
    page_size: usize,
    pages_scanned: AtomicUsize,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            products: RwLock::new(Vec::new()),
            page_size: page_size.max(1),
            pages_scanned: AtomicUsize::new(0),
        }
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
            ..Self::new()
        }
    }

    /// Total scan pages served since creation
    pub fn pages_scanned(&self) -> usize {
        self.pages_scanned.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }
}

impl Default for InMemoryProductRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| product.id == id).cloned())
    }

    #[instrument(skip(self))]
    async fn scan_by_category(&self, category_id: &str) -> RepositoryResult<Vec<Product>> {
        let mut matches = Vec::new();
        let mut start_key: Option<usize> = Some(0);

        while let Some(offset) = start_key {
            let products = self.products.read().await;
            let end = (offset + self.page_size).min(products.len());

            matches.extend(
                products[offset.min(end)..end]
                    .iter()
                    .filter(|product| product.in_category(category_id))
                    .cloned(),
            );
            self.pages_scanned.fetch_add(1, Ordering::Relaxed);

            start_key = (end < products.len()).then_some(end);
        }

        debug!("Found {} products in category {}", matches.len(), category_id);
        Ok(matches)
    }

    async fn put(&self, product: Product) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|stored| stored.id == product.id) {
            Some(stored) => *stored = product,
            None => products.push(product),
        }
        Ok(())
    }
}
