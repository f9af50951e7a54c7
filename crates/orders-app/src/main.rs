use orders_hex::application::order_lifecycle::OrderLifecycle;
use orders_hex::config::Config;
use orders_hex::inbound::http::{HttpServer, HttpServerConfig};
use orders_repo::{build_store, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT / RUST_LOG when present.
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.as_str())
        .init();

    let store: Store = build_store(config.database_url.as_deref()).await?;
    let lifecycle = OrderLifecycle::new(store);

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };
    tracing::info!(port = %config.server_port, "orders service configured");

    let http = HttpServer::new(lifecycle, server_cfg).await?;
    http.run().await
}
