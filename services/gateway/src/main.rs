mod auth;
mod config;
mod error;
mod handlers;
mod mint_http;
mod models;
mod router;
mod state;

use config::GatewayConfig;
use router::create_router;
use state::AppState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env();
    tracing::info!(
        bind_addr = %config.bind_addr,
        journal_dir = %config.journal_dir.display(),
        "starting energy trading gateway"
    );

    // Replay the journal and rehydrate all services before binding
    let state = AppState::initialize(&config)?;

    let app = create_router(state);
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
