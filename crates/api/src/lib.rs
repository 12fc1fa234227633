pub mod client;
pub mod cloudevent;
pub mod handlers;
pub mod routes;
pub mod state;

pub use client::*;
pub use cloudevent::*;
pub use handlers::*;
pub use routes::*;
pub use state::*;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// The router with tracing, CORS and the configured request body limit.
pub fn app(state: AppState) -> Router {
    let body_limit = (state.config.server.max_request_body_size_mb as usize) * 1024 * 1024;
    Router::new().merge(build_router(state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::max(body_limit)),
    )
}

pub async fn start_server(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bind = state.config.server.bind.clone();
    let port = state.config.server.port;
    let function = state.function.name().to_string();

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
    info!("Serving function {} on {}:{}", function, bind, port);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
