use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::info;

use bookstore_rs::{
    config::DatabaseConfig,
    import::{import_records, load_records},
    repositories::DynamoDbProductRepository,
};

/// Load book records from a JSON file into the catalog table
#[derive(Debug, Parser)]
#[command(name = "book-import", about = "Import books into DynamoDB", long_about = None)]
struct Args {
    /// JSON file holding an array of book objects
    #[arg(short, long, default_value = "books.json")]
    file: PathBuf,

    /// Target table
    #[arg(short, long, env = "BOOKSTORE_BOOKS_TABLE_NAME", default_value = "Books")]
    table: String,

    #[arg(short, long, env = "BOOKSTORE_REGION", default_value = "us-east-1")]
    region: String,

    /// DynamoDB endpoint override, e.g. http://localhost:8000 for DynamoDB Local
    #[arg(long, env = "BOOKSTORE_ENDPOINT_URL")]
    endpoint_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();

    let database = DatabaseConfig {
        books_table_name: args.table,
        region: args.region,
        endpoint_url: args.endpoint_url,
    };
    let client = Arc::new(database.dynamodb_client().await);
    let repository = DynamoDbProductRepository::new(
        client,
        database.books_table_name.clone(),
        database.region.clone(),
    );

    let books = load_records(&args.file)
        .await
        .with_context(|| format!("Failed to load books from {}", args.file.display()))?;

    import_records(&repository, books)
        .await
        .with_context(|| format!("Import into table {} failed", database.books_table_name))?;

    info!("All books have been added to DynamoDB");
    Ok(())
}
