//! Worker server
//!
//! Accepts invocations over HTTP so that [`crate::dispatch::HttpInvoker`]
//! submissions (and external schedulers) can start bounded executions.

mod error;
mod routes;
mod state;
mod utils;

pub use error::{ErrorResponse, ServerError};
pub use routes::InvokeAccepted;
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invoke/{worker}", post(routes::invoke))
        .route("/chains/{chain_id}", get(routes::get_chain))
        .route("/metrics", get(routes::metrics))
        .route("/health", get(routes::health))
        .with_state(state)
        // Handles Content-Encoding on request bodies before the handlers see them
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address: SocketAddr, state: AppState) -> Result<(), AnyError> {
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "harvestrelay worker listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
