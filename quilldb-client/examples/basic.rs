//! Connects to a local QuillDB server and runs a few queries.
//!
//! Run with: `cargo run --example basic`

use quilldb_client::builder::{field, r};
use quilldb_client::Client;
use serde_json::json;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quilldb_client=debug".into()),
        )
        .init();

    let addr: SocketAddr = format!("127.0.0.1:{}", quilldb_protocol::DEFAULT_PORT).parse()?;
    let client = Client::connect(addr).await?;
    client.ping().await?;

    r().db_create("mydb").run(&client).await?;
    r().db("mydb").table_create("users").run(&client).await?;

    let table = r().db("mydb").table("users");
    table
        .insert(vec![
            json!({ "id": 1, "name": "Alice", "age": 30 }),
            json!({ "id": 2, "name": "Bob", "age": 17 }),
        ])
        .run(&client)
        .await?;

    let adults = table
        .filter(field("age").ge(21))
        .run(&client)
        .await?
        .to_array()
        .await?;
    println!("adults: {adults:?}");

    let count = table.count().run(&client).await?;
    println!("count: {count}");

    client.close().await?;
    Ok(())
}
