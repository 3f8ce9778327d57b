pub mod adapters;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod ports;
pub mod push;
pub mod records;
pub mod state;
pub mod storage;
pub mod types;

pub use app::StartupError;
pub use push::generate_vapid_credentials;

use std::net::SocketAddr;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) -> Result<(), StartupError> {
    let state = app::build_state(config).await?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app::router(state))
        .await
        .map_err(StartupError::Serve)
}
