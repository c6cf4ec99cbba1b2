//! drafftmark relay server binary.
//!
//! Bind address comes from `DRAFFTMARK_RELAY_ADDR`, log filter from `RUST_LOG`.

use std::{net::SocketAddr, sync::Arc};

use drafftmark_relay::{AppState, router};
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

fn bind_addr() -> SocketAddr {
    let fallback = SocketAddr::from(([0, 0, 0, 0], 3030));
    match std::env::var("DRAFFTMARK_RELAY_ADDR") {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid DRAFFTMARK_RELAY_ADDR {:?} ({}), using {}", raw, e, DEFAULT_ADDR);
            fallback
        }),
        Err(_) => fallback,
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drafftmark_relay=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());
    let app = router(state);

    let addr = bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("drafftmark relay listening on {}", listener.local_addr()?);
    info!("WebSocket endpoint: ws://{}/ws", listener.local_addr()?);

    axum::serve(listener, app).await
}
