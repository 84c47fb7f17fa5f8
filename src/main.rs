//! Propnest binary entry point

use propnest::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Initialize metrics
/// 3. Load configuration from file and environment
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("PROPNEST__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "propnest=info,tower_http=debug".into())
    };

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Propnest...");

    // 2. Initialize metrics
    propnest::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        client_url = %config.server.client_url,
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    // 4. Initialize application state
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config).await?;

    // 5. Build Axum router
    let app = propnest::build_router(state);

    // 6. Start HTTP server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
