//! REST API endpoints.
//!
//! Axum-based HTTP API for uploading, listing, serving and deleting images,
//! plus a flat JSON document store. The storage directories are also
//! mounted as static file trees.

pub mod routes;
pub mod state;

use std::sync::LazyLock;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::models::Category;
use crate::storage::StorageError;
use routes::{data, health, images, uploads};
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidCategory(_)
            | StorageError::InvalidSegment(_)
            | StorageError::BadUpload(_) => ApiError::BadRequest(err.to_string()),
            StorageError::NotFound(message) => ApiError::NotFound(message),
            StorageError::Io(_) | StorageError::Json(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Plain success acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Parse a category path parameter.
pub fn parse_category(raw: &str) -> Result<Category, ApiError> {
    raw.parse()
        .map_err(|_| StorageError::InvalidCategory(raw.to_string()).into())
}

/// Run filesystem work on the blocking pool.
pub async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let layout = state.images.layout().clone();
    let multipart_limit = state
        .uploads
        .max_files
        .saturating_mul(state.uploads.max_file_size_bytes)
        .saturating_add(1024 * 1024);

    Router::new()
        .route("/api/health", get(health::health))
        .route(
            "/api/upload/:category",
            post(uploads::upload_files).layer(DefaultBodyLimit::max(multipart_limit)),
        )
        .route("/api/upload-base64/:category", post(uploads::upload_base64))
        .route("/api/images/:category", get(images::list_images))
        .route(
            "/api/images/:category/:filename",
            get(images::get_image).delete(images::delete_image),
        )
        .route(
            "/api/images/:category/:subfolder/:filename",
            get(images::get_subfolder_image),
        )
        .route("/api/delete-by-url", post(images::delete_by_url))
        .route(
            "/api/data/:filename",
            get(data::load_data)
                .post(data::save_data)
                .delete(data::delete_data),
        )
        .nest_service(
            "/gallery",
            ServeDir::new(layout.category_dir(Category::Gallery)),
        )
        .nest_service(
            "/history",
            ServeDir::new(layout.category_dir(Category::History)),
        )
        .nest_service("/data", ServeDir::new(layout.data_dir()))
        .layer(DefaultBodyLimit::max(state.uploads.max_json_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

static LOCAL_ORIGINS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^http://localhost:3000$",
        r"^http://127\.\d+\.\d+\.\d+:3000$",
        r"^http://192\.168\.\d+\.\d+:3000$",
        r"^http://172\.16\.\d+\.\d+:3000$",
        r"^http://10\.\d+\.\d+\.\d+:3000$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("origin pattern is valid"))
    .collect()
});

/// The front-end's dev server on this machine or the local network, or one
/// of the configured extras.
pub fn is_allowed_origin(origin: &str, extra: &[String]) -> bool {
    extra.iter().any(|o| o == origin) || LOCAL_ORIGINS.iter().any(|re| re.is_match(origin))
}

/// CORS policy for the front-end. `dev_mode` lets every origin through.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let extra = server.allowed_origins.clone();
    let dev_mode = server.dev_mode;

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                dev_mode
                    || origin
                        .to_str()
                        .is_ok_and(|o| is_allowed_origin(o, &extra))
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
