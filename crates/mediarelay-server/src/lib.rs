pub mod auth;
pub mod config;
pub mod gating;
mod routes;
pub mod state;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use state::AppState;

/// The full HTTP surface over `state`.
pub fn app(state: AppState) -> Router {
    routes::build_router(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = app(state);
    axum::serve(listener, app).await?;
    Ok(())
}
