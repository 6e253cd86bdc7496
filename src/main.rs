use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use legacy_guardians_backend::app;
use legacy_guardians_backend::config::{PriceSource, ServerConfig};
use legacy_guardians_backend::external::mock::MockPriceProvider;
use legacy_guardians_backend::external::price_provider::PriceProvider;
use legacy_guardians_backend::external::yahoo::YahooProvider;
use legacy_guardians_backend::logging::{init_logging, LoggingConfig};
use legacy_guardians_backend::services::llm_service::{LlmConfig, LlmService};
use legacy_guardians_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let server = ServerConfig::from_env();
    let llm = Arc::new(LlmService::new(LlmConfig::from_env()));

    let price_provider: Arc<dyn PriceProvider> = match server.price_source {
        PriceSource::Yahoo => match YahooProvider::new() {
            Ok(provider) => {
                info!("📊 Using price provider: Yahoo Finance (mock fallback per ticker)");
                Arc::new(provider)
            }
            Err(e) => {
                warn!("Failed to create Yahoo provider ({}), serving mock prices only", e);
                Arc::new(MockPriceProvider)
            }
        },
        PriceSource::Mock => {
            info!("📊 Using price provider: mock random walk");
            Arc::new(MockPriceProvider)
        }
    };

    let state = AppState::new(llm, price_provider);
    let app = app::create_app(state);

    let addr = server.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Legacy Guardians backend running at http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
