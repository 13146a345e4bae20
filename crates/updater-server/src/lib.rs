pub mod error;
pub mod routes;
pub mod state;
pub mod webhook;

use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with the webhook and health routes.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Webhook (method is checked by the handler so it can answer 405)
        .route("/hook", any(routes::hook::hook))
        // Health and config
        .route("/healthz", get(routes::health::healthz))
        .route("/config", get(routes::health::get_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on a pre-bound listener until the process is stopped.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("config-updater listening on http://{addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Bind `0.0.0.0:port` and serve.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(state, listener).await
}
