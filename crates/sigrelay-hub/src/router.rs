//! Axum router wiring (HTTP -> WS upgrade).
//!
//! `/v1/ws` upgrades to a relay session; `/healthz` answers `ok`.

use axum::{routing::get, Router};

use crate::{app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/ws", get(transport::ws::ws_upgrade))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
