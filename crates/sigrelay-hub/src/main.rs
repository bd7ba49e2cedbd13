//! sigrelay hub binary.
//!
//! - WebSocket endpoint: /v1/ws
//! - Config from `SIGRELAY_CONFIG` (default `sigrelay.yaml`)
//! - Log filter from `RUST_LOG`

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use sigrelay_core::{RelayError, Result};
use sigrelay_hub::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, kind = %e.kind(), "sigrelay-hub failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("SIGRELAY_CONFIG").unwrap_or_else(|_| "sigrelay.yaml".into());
    let cfg = config::RelayConfig::load(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| RelayError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "sigrelay-hub starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| RelayError::Internal(format!("server failed: {e}")))
}
