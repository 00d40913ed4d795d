//! HTTP push endpoint
//!
//! Every path accepts `POST` with a Pub/Sub push envelope. Responses carry no
//! structured data:
//! - `200` with an empty body once the row is written
//! - `400` with the error text when the request itself is bad
//! - `500` with the error text when the table write fails
//!
//! The pipeline blocks on the storage call, so each request runs it on its
//! own blocking worker thread.

use crate::error::IngestError;
use crate::ingest::Ingestor;
use crate::logging::{FailureType, log_ingest_failure};
use axum::{
    Router,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Upper bound on a push body. Pub/Sub messages are at most 10 MB before
/// base64 expansion.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// Application State
// =============================================================================

pub struct AppState {
    pub ingestor: Ingestor,
}

impl AppState {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }
}

// =============================================================================
// Router
// =============================================================================

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new().fallback(receive_push).with_state(state)
}

fn failure_response(err: IngestError) -> Response {
    let status = match log_ingest_failure(&err) {
        FailureType::Rejected => StatusCode::BAD_REQUEST,
        FailureType::Backend => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

async fn receive_push(State(state): State<Arc<AppState>>, request: Request) -> Response {
    if request.method() != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "only POST is accepted").into_response();
    }

    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return failure_response(IngestError::BodyRead(e.to_string())),
    };

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || worker_state.ingestor.process(&body)).await;

    match result {
        Ok(Ok(outcome)) => {
            info!(
                delivery_id = %outcome.delivery_id,
                subscription = %outcome.subscription,
                row_key = %outcome.row_key,
                status = %outcome.status,
                "row written"
            );
            StatusCode::OK.into_response()
        }
        Ok(Err(err)) => failure_response(err),
        Err(join_error) => {
            error!(error = %join_error, "ingest worker did not complete");
            (StatusCode::INTERNAL_SERVER_ERROR, "ingest worker did not complete").into_response()
        }
    }
}

// =============================================================================
// Serving
// =============================================================================

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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

/// Serve the push endpoint on all interfaces until a shutdown signal arrives.
pub async fn serve(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("The service will be listening on port {}", port);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
