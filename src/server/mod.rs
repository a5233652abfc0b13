//! HTTP surface of the conversion service.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/api/convert` | multipart upload → `{success, pdfId, filename, size}` |
//! | `GET`  | `/api/download/{id}` | stored PDF as an attachment |
//! | `GET`  | `/api/converter` | converter version probe |
//! | `GET`  | `/health` | liveness |

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use crate::convert::Md2Pdf;
use crate::error::Md2PdfError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router for `engine`.
pub fn router(engine: Arc<Md2Pdf>) -> Router {
    let body_limit = engine.config().max_upload_bytes;
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/convert", post(handlers::convert))
        .route("/api/download/{id}", get(handlers::download))
        .route("/api/converter", get(handlers::converter_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(engine))
}

/// Serve on `listener` until `shutdown` resolves. Starts the retention
/// sweeper for the lifetime of the server.
pub async fn serve<F>(
    engine: Arc<Md2Pdf>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), Md2PdfError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = engine.spawn_retention_sweeper();
    if let Ok(addr) = listener.local_addr() {
        info!(
            "md2pdf listening on http://{} (converter: {})",
            addr,
            engine.config().converter
        );
    }

    let result = axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Md2PdfError::Internal(format!("server error: {e}")));

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("md2pdf stopped");
    result
}
