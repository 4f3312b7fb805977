use axum::extract::multipart::Field;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::{blocking, parse_category, ApiError};
use crate::storage::images::{check_upload, decode_data_url};
use crate::storage::{is_valid_segment, sanitize_subfolder, upload_filename, StorageError};

/// Multipart field carrying the files.
const FILES_FIELD: &str = "images";

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub subfolder: Option<String>,
}

impl UploadParams {
    fn subfolder(&self) -> String {
        sanitize_subfolder(self.subfolder.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub urls: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct Base64UploadRequest {
    pub base64: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Base64UploadResponse {
    pub success: bool,
    pub url: String,
    pub filename: String,
}

/// Read a multipart field, failing once it grows past `max` bytes.
async fn read_limited(mut field: Field<'_>, max: usize) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if buf.len() + chunk.len() > max {
            return Err(
                StorageError::BadUpload(format!("File too large (max {} bytes)", max)).into(),
            );
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Every part is checked and buffered before anything is written, so a
/// rejected request leaves no files behind.
pub async fn upload_files(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let category = parse_category(&category)?;
    let subfolder = params.subfolder();
    let limits = state.uploads.clone();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        if files.len() >= limits.max_files {
            return Err(StorageError::BadUpload(format!(
                "Too many files (max {})",
                limits.max_files
            ))
            .into());
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let extension = check_upload(&original, field.content_type())?;
        let bytes = read_limited(field, limits.max_file_size_bytes).await?;
        debug!("Received {:?} ({} bytes)", original, bytes.len());
        files.push((upload_filename(&extension), bytes));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    let images = state.images.clone();
    let stored = blocking(move || images.save_batch(category, &subfolder, &files)).await?;
    let urls: Vec<String> = stored
        .iter()
        .map(|file| format!("{}/{}", state.base_url, file.url_path()))
        .collect();

    Ok(Json(UploadResponse {
        success: true,
        count: urls.len(),
        urls,
    }))
}

pub async fn upload_base64(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<UploadParams>,
    payload: Result<Json<Base64UploadRequest>, JsonRejection>,
) -> Result<Json<Base64UploadResponse>, ApiError> {
    let category = parse_category(&category)?;
    let Json(body) = payload?;
    let subfolder = params.subfolder();

    let data_url = body
        .base64
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No base64 data provided".to_string()))?;
    let requested = body.filename.filter(|f| !f.is_empty());
    if let Some(name) = &requested {
        if !is_valid_segment(name) {
            return Err(StorageError::InvalidSegment(name.clone()).into());
        }
    }

    let images = state.images.clone();
    let stored = blocking(move || {
        let (extension, bytes) = decode_data_url(&data_url)?;
        let filename = requested.unwrap_or_else(|| upload_filename(&format!(".{}", extension)));
        images.save(category, &subfolder, &filename, &bytes)
    })
    .await?;

    Ok(Json(Base64UploadResponse {
        success: true,
        url: format!("{}/{}", state.base_url, stored.url_path()),
        filename: stored.filename,
    }))
}
