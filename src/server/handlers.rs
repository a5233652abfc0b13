//! Request handlers for the conversion API.
//!
//! `POST /api/convert` reads the multipart form into a [`ConversionRequest`];
//! `GET /api/download/{id}` returns a stored artifact as an attachment.

use crate::options::{ConversionRequest, DocumentMetadata, InputFile, PandocOptions};
use crate::pipeline::workspace::sanitize_filename;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Display name used when the download request does not supply one.
pub const DEFAULT_DOWNLOAD_NAME: &str = "document.pdf";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub pdf_id: Uuid,
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub filename: Option<String>,
}

/// `POST /api/convert`
pub async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let request = read_request(&mut multipart).await?;
    info!("Conversion request with {} file(s)", request.files().len());

    let record = state.engine.convert(&request).await?;
    Ok(Json(ConvertResponse {
        success: true,
        pdf_id: record.id,
        filename: record.filename,
        size: record.size,
    }))
}

/// Collect `files`, `pandocConfig` and `eisvogelConfig` from the form.
async fn read_request(multipart: &mut Multipart) -> Result<ConversionRequest, ApiError> {
    let mut files = Vec::new();
    let mut options = None;
    let mut metadata = None;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(ApiError::multipart)?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                files.push(InputFile::new(file_name, bytes.to_vec()));
            }
            "pandocConfig" => {
                let raw = field.text().await.map_err(ApiError::multipart)?;
                options = Some(PandocOptions::from_json(&raw)?);
            }
            "eisvogelConfig" => {
                let raw = field.text().await.map_err(ApiError::multipart)?;
                metadata = Some(DocumentMetadata::from_json(&raw)?);
            }
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    Ok(ConversionRequest::new(
        files,
        options.unwrap_or_default(),
        metadata.unwrap_or_default(),
    )?)
}

/// `GET /api/download/{id}?filename=…`
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let bytes = state.engine.retrieve(&id).await?;
    let filename = query
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(sanitize_filename)
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
    debug!("Serving artifact {} as '{}' ({} bytes)", id, filename, bytes.len());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "md2pdf",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/converter`: launch the converter once and report its version.
pub async fn converter_status(State(state): State<AppState>) -> Response {
    match state.engine.probe().await {
        Ok(version) => Json(json!({
            "success": true,
            "converterVersion": version,
        }))
        .into_response(),
        Err(e) => {
            warn!("Converter probe failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
