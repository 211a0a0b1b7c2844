//! Batch loading of book records into the product store.

use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::models::{Product, RepositoryError};
use crate::repositories::ProductRepository;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid book data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record {index} is invalid: {message}")]
    InvalidRecord { index: usize, message: String },

    #[error("Failed to store book {id}: {source}")]
    Repository {
        id: String,
        #[source]
        source: RepositoryError,
    },
}

/// Parse a JSON array of book objects.
///
/// Every record needs a string `id`. Fractional numbers become exact
/// decimals, everything else is carried through as-is.
pub fn parse_records(json: &str) -> Result<Vec<Product>, ImportError> {
    let records: Vec<Value> = serde_json::from_str(json)?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let invalid = |message: &str| ImportError::InvalidRecord {
                index,
                message: message.to_string(),
            };

            let Value::Object(mut fields) = record else {
                return Err(invalid("not an object"));
            };
            match fields.remove("id") {
                Some(Value::String(id)) => Ok(Product::from_attributes(id, fields)),
                _ => Err(invalid("missing string id")),
            }
        })
        .collect()
}

pub async fn load_records(path: impl AsRef<Path>) -> Result<Vec<Product>, ImportError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Io {
            path: path.display().to_string(),
            source,
        })?;

    parse_records(&json)
}

/// Store each record in order. The first failure stops the import.
pub async fn import_records(
    repository: &dyn ProductRepository,
    products: Vec<Product>,
) -> Result<usize, ImportError> {
    let mut imported = 0;

    for product in products {
        let id = product.id.clone();
        let name = product.name.clone().unwrap_or_default();

        repository
            .put(product)
            .await
            .map_err(|source| ImportError::Repository {
                id: id.clone(),
                source,
            })?;

        info!("Added book: {} with ID: {}", name, id);
        imported += 1;
    }

    Ok(imported)
}
