use std::sync::Arc;

use tracing::info;

use swapi_aggregator::client::SwapiClient;
use swapi_aggregator::config::Config;
use swapi_aggregator::server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "swapi_aggregator=info,tower_http=info".to_string()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let client = SwapiClient::new(config.upstream_base.clone(), config.request_timeout)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState {
        client: Arc::new(client),
        config: Arc::new(config),
    };
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
