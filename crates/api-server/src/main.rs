//! API Server Binary Entry Point

use slide_convert_api_server::{start_server, ApiState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slide_convert_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get bind address from environment or use default
    let addr = std::env::var("SLIDE_CONVERT_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    // Create API state
    let state = ApiState::new(ServerConfig::default())?;

    // Start server
    tracing::info!("Starting presentation conversion API server");
    start_server(&addr, state).await?;

    Ok(())
}
