use async_trait::async_trait;
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use crate::models::{parse_decimal, Product, RepositoryError, RepositoryResult};
use crate::observability::{DatabaseTracingMiddleware, Metrics};

/// Item attribute matched by category scans
const CATEGORY_ATTRIBUTE: &str = "categoryId";

/// Trait defining the interface for product data access operations
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Find a product by its exact key. A miss is `None`.
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>>;

    /// Every product whose `categoryId` equals `category_id`, across all store pages
    async fn scan_by_category(&self, category_id: &str) -> RepositoryResult<Vec<Product>>;

    /// Unconditional upsert keyed by `id`
    async fn put(&self, product: Product) -> RepositoryResult<()>;
}

/// DynamoDB implementation of the ProductRepository trait
pub struct DynamoDbProductRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
    db_tracer: Option<DatabaseTracingMiddleware>,
}

impl DynamoDbProductRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
            db_tracer: None,
        }
    }

    /// Record every store call in the `database_operations_total` metrics
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.db_tracer = Some(DatabaseTracingMiddleware::new(metrics));
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Start a lazy scan over one category, one store page per `next_page` call
    pub fn scan_category(&self, category_id: &str) -> ProductScan<'_> {
        ProductScan {
            repository: self,
            category_id: category_id.to_string(),
            exclusive_start_key: None,
            pages_fetched: 0,
            finished: false,
        }
    }

    /// Create a DynamoDB subsegment span with X-Ray attributes
    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.request_id" = tracing::field::Empty,
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,

            // OpenTelemetry semantic conventions
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
            "http.status_code" = tracing::field::Empty,
        )
    }

    async fn observe<F, T>(&self, operation: &str, future: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        match &self.db_tracer {
            Some(tracer) => {
                tracer
                    .trace_operation(operation, &self.table_name, future)
                    .await
            }
            None => future.await,
        }
    }

    /// Convert DynamoDB error to RepositoryError
    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        if matches!(error, DynamoDbError::ResourceNotFoundException(_)) {
            return RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            };
        }

        RepositoryError::AwsSdk {
            message: error.to_string(),
        }
    }
}

/// Lazy, resumable scan over the products of one category.
///
/// Each call to [`ProductScan::next_page`] issues one `Scan` request and
/// remembers DynamoDB's `LastEvaluatedKey` for the next one. The scan is
/// exhausted once the store stops returning a continuation key.
pub struct ProductScan<'a> {
    repository: &'a DynamoDbProductRepository,
    category_id: String,
    exclusive_start_key: Option<HashMap<String, AttributeValue>>,
    pages_fetched: usize,
    finished: bool,
}

impl ProductScan<'_> {
    /// Fetch the next page, or `None` once the scan is exhausted
    pub async fn next_page(&mut self) -> RepositoryResult<Option<Vec<Product>>> {
        if self.finished {
            return Ok(None);
        }

        let repository = self.repository;
        let scan_span = repository.create_dynamodb_span("Scan");

        let request = repository
            .client
            .scan()
            .table_name(&repository.table_name)
            .filter_expression(format!("{} = :category_id", CATEGORY_ATTRIBUTE))
            .expression_attribute_values(
                ":category_id",
                AttributeValue::S(self.category_id.clone()),
            )
            .set_exclusive_start_key(self.exclusive_start_key.clone());

        let response = repository
            .observe("Scan", async {
                request
                    .send()
                    .await
                    .map_err(|e| repository.map_dynamodb_error(e.into()))
            })
            .instrument(scan_span)
            .await?;

        self.pages_fetched += 1;
        self.exclusive_start_key = response.last_evaluated_key.filter(|key| !key.is_empty());
        self.finished = self.exclusive_start_key.is_none();

        let products = response
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| match item_to_product(item) {
                Ok(product) => Some(product),
                Err(e) => {
                    warn!("Failed to parse product item: {}", e);
                    None
                }
            })
            .collect();

        Ok(Some(products))
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[async_trait]
impl ProductRepository for DynamoDbProductRepository {
    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>> {
        let get_span = self.create_dynamodb_span("GetItem");

        let response = self
            .observe("GetItem", async {
                let result = self
                    .client
                    .get_item()
                    .table_name(&self.table_name)
                    .key("id", AttributeValue::S(id.to_string()))
                    .send()
                    .await;

                match &result {
                    Ok(output) => {
                        tracing::Span::current().record("http.status_code", 200);
                        if let Some(request_id) = output.request_id() {
                            tracing::Span::current().record("aws.request_id", request_id);
                        }
                    }
                    Err(e) => {
                        tracing::Span::current().record("http.status_code", 400);
                        error!("DynamoDB GetItem failed: {}", e);
                    }
                }

                result.map_err(|e| self.map_dynamodb_error(e.into()))
            })
            .instrument(get_span)
            .await?;

        match response.item {
            Some(item) => Ok(Some(item_to_product(item)?)),
            None => {
                info!("Product not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, category_id = %category_id))]
    async fn scan_by_category(&self, category_id: &str) -> RepositoryResult<Vec<Product>> {
        let mut scan = self.scan_category(category_id);
        let mut products = Vec::new();

        while let Some(page) = scan.next_page().await? {
            products.extend(page);
        }

        info!(
            pages = scan.pages_fetched(),
            "Found {} products in category {}",
            products.len(),
            category_id
        );
        Ok(products)
    }

    #[instrument(skip(self, product), fields(table = %self.table_name, id = %product.id))]
    async fn put(&self, product: Product) -> RepositoryResult<()> {
        let item = product_to_item(&product)?;
        let put_span = self.create_dynamodb_span("PutItem");

        self.observe("PutItem", async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        })
        .instrument(put_span)
        .await?;

        Ok(())
    }
}

/// Convert a stored item into a product.
///
/// `id` is the only required attribute. Well-known attributes with an
/// unexpected type are kept as plain attributes. `price` is read from its
/// DynamoDB number text directly so no precision is lost on the way to `Decimal`.
pub fn item_to_product(mut item: HashMap<String, AttributeValue>) -> RepositoryResult<Product> {
    let id = match item.remove("id") {
        Some(AttributeValue::S(id)) => id,
        _ => {
            return Err(RepositoryError::InvalidItem {
                message: "Missing id".to_string(),
            })
        }
    };

    let raw_price = item.remove("price");
    let price = raw_price.as_ref().and_then(parse_price);

    let attributes: Map<String, Value> = item
        .iter()
        .filter_map(|(name, value)| attribute_to_json(value).map(|json| (name.clone(), json)))
        .collect();

    let mut product = Product::from_attributes(id, attributes);
    product.price = price;

    if price.is_none() {
        if let Some(json) = raw_price.as_ref().and_then(attribute_to_json) {
            warn!(id = %product.id, "Product price is not a valid decimal");
            product.attributes.insert("price".to_string(), json);
        }
    }

    Ok(product)
}

/// Convert a product into a storable item, keeping every extra attribute
pub fn product_to_item(product: &Product) -> RepositoryResult<HashMap<String, AttributeValue>> {
    let mut item: HashMap<String, AttributeValue> = match serde_json::to_value(product)? {
        Value::Object(fields) => fields
            .iter()
            .map(|(name, value)| (name.clone(), json_to_attribute(value)))
            .collect(),
        _ => {
            return Err(RepositoryError::InvalidItem {
                message: format!("Product {} did not serialize to an object", product.id),
            })
        }
    };

    if let Some(price) = product.price {
        item.insert("price".to_string(), AttributeValue::N(price.to_string()));
    }

    Ok(item)
}

fn parse_price(value: &AttributeValue) -> Option<Decimal> {
    let text = match value {
        AttributeValue::N(n) => n,
        AttributeValue::S(s) => s,
        _ => return None,
    };
    parse_decimal(text)
}

/// DynamoDB attribute to JSON. Binary attributes have no JSON form and yield `None`.
pub fn attribute_to_json(value: &AttributeValue) -> Option<Value> {
    match value {
        AttributeValue::S(s) => Some(Value::String(s.clone())),
        AttributeValue::N(n) => Some(number_to_json(n)),
        AttributeValue::Bool(b) => Some(Value::Bool(*b)),
        AttributeValue::Null(_) => Some(Value::Null),
        AttributeValue::L(list) => Some(Value::Array(
            list.iter().filter_map(attribute_to_json).collect(),
        )),
        AttributeValue::M(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(name, value)| {
                    attribute_to_json(value).map(|json| (name.clone(), json))
                })
                .collect(),
        )),
        AttributeValue::Ss(strings) => Some(Value::Array(
            strings.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(numbers) => Some(Value::Array(
            numbers.iter().map(|n| number_to_json(n)).collect(),
        )),
        _ => None,
    }
}

fn number_to_json(n: &str) -> Value {
    Number::from_str(n)
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(n.to_string()))
}

/// JSON to DynamoDB attribute. Numbers keep their textual form.
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(json_to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), json_to_attribute(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> Arc<DynamoDbClient> {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        Arc::new(DynamoDbClient::from_conf(config))
    }

    #[test]
    fn test_repository_creation() {
        let repo = DynamoDbProductRepository::new(
            create_test_client(),
            "Books".to_string(),
            "us-east-1".to_string(),
        );

        assert_eq!(repo.table_name(), "Books");
        assert!(repo.db_tracer.is_none());

        let repo = repo.with_metrics(Arc::new(Metrics::new().unwrap()));
        assert!(repo.db_tracer.is_some());
    }

    #[test]
    fn test_new_scan_is_not_started() {
        let repo = DynamoDbProductRepository::new(
            create_test_client(),
            "Books".to_string(),
            "us-east-1".to_string(),
        );

        let scan = repo.scan_category("poetry");
        assert_eq!(scan.pages_fetched(), 0);
        assert!(!scan.is_finished());
    }

    #[test]
    fn test_resource_not_found_maps_to_table_not_found() {
        let repo = DynamoDbProductRepository::new(
            create_test_client(),
            "Books".to_string(),
            "us-east-1".to_string(),
        );

        let error = DynamoDbError::ResourceNotFoundException(
            aws_sdk_dynamodb::types::error::ResourceNotFoundException::builder()
                .message("Requested resource not found")
                .build(),
        );

        match repo.map_dynamodb_error(error) {
            RepositoryError::TableNotFound { table_name } => assert_eq!(table_name, "Books"),
            other => panic!("Expected TableNotFound, got {:?}", other),
        }
    }
}
