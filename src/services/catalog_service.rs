use std::sync::Arc;
use tracing::{debug, instrument};

use crate::models::{Category, Product, ServiceError, ServiceResult, CATEGORIES};
use crate::repositories::ProductRepository;

/// Products shown on the storefront landing page, in display order
pub const FEATURED_PRODUCT_IDS: [&str; 5] = ["1", "3", "7", "11", "8"];

/// Read-only access to categories and the product catalog
pub struct CatalogService {
    repository: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn ProductRepository>) -> Self {
        Self { repository }
    }

    /// All categories, always in the same order
    pub fn list_categories(&self) -> Vec<Category> {
        CATEGORIES.to_vec()
    }

    pub fn get_category(&self, id: &str) -> ServiceResult<Category> {
        Category::find(id)
            .copied()
            .ok_or_else(|| ServiceError::CategoryNotFound { id: id.to_string() })
    }

    /// Products filed under `category_id`.
    ///
    /// The category id is not checked against the known categories, so an
    /// unknown id yields an empty list. Order follows the store.
    #[instrument(skip(self))]
    pub async fn list_products_by_category(&self, category_id: &str) -> ServiceResult<Vec<Product>> {
        let products = self.repository.scan_by_category(category_id).await?;
        crate::info_with_trace!(
            category_id = %category_id,
            count = products.len(),
            "Listed products by category"
        );
        Ok(products)
    }

    /// Fetch the featured products by key, one at a time, skipping ids the store lacks
    #[instrument(skip(self))]
    pub async fn get_featured_products(&self) -> ServiceResult<Vec<Product>> {
        let mut featured = Vec::with_capacity(FEATURED_PRODUCT_IDS.len());

        for id in FEATURED_PRODUCT_IDS {
            match self.repository.find_by_id(id).await? {
                Some(product) => featured.push(product),
                None => debug!(product_id = %id, "Featured product missing from store"),
            }
        }

        Ok(featured)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> ServiceResult<Product> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound { id: id.to_string() })
    }
}
