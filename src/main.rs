use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use bookstore_rs::{
    create_app, init_observability,
    observability::Metrics,
    repositories::{DynamoDbProductRepository, InMemoryCartRepository},
    services::{CartService, CatalogService},
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment().await?;
    println!("Configuration loaded successfully");

    init_observability(&config.observability)?;

    info!("Starting bookstore-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!("DynamoDB table: books={}", config.database.books_table_name);

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());

    let product_repository = Arc::new(
        DynamoDbProductRepository::new(
            dynamodb_client,
            config.database.books_table_name.clone(),
            config.database.region.clone(),
        )
        .with_metrics(metrics.clone()),
    );
    let cart_repository = Arc::new(InMemoryCartRepository::new());
    info!("Repositories initialized successfully");

    let catalog_service = Arc::new(CatalogService::new(product_repository.clone()));
    let cart_service = Arc::new(
        CartService::new(cart_repository, product_repository).with_metrics(metrics.clone()),
    );
    info!("Services initialized successfully");

    let app = create_app(catalog_service, cart_service, metrics);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
