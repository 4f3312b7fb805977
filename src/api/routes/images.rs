use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tower::util::ServiceExt;
use tower_http::services::ServeFile;

use crate::api::state::AppState;
use crate::api::{blocking, parse_category, ApiError, MessageResponse};
use crate::models::StoredImage;
use crate::storage::{sanitize_subfolder, ResolvedPath, StorageError};

#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub images: Vec<StoredImage>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct DeleteByUrlRequest {
    pub url: Option<String>,
}

pub async fn list_images(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<ImageListResponse>, ApiError> {
    let category = parse_category(&category)?;
    let images = state.images.clone();
    let base_url = state.base_url.clone();

    let images = blocking(move || images.list(category, &base_url)).await?;
    Ok(Json(ImageListResponse {
        count: images.len(),
        images,
    }))
}

/// Stream a located file back, with content type and range support.
async fn serve(
    state: &AppState,
    resolved: ResolvedPath,
    request: Request,
) -> Result<Response, ApiError> {
    let images = state.images.clone();
    let path = blocking(move || images.locate(&resolved)).await?;
    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .unwrap_or_else(|e| match e {});
    Ok(response.map(Body::new).into_response())
}

pub async fn get_image(
    State(state): State<AppState>,
    Path((category, filename)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let category = parse_category(&category)?;
    let resolved = state.images.resolve(category, &[filename])?;
    serve(&state, resolved, request).await
}

pub async fn get_subfolder_image(
    State(state): State<AppState>,
    Path((category, subfolder, filename)): Path<(String, String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let category = parse_category(&category)?;
    let subfolder = sanitize_subfolder(&subfolder);
    if subfolder.is_empty() {
        return Err(StorageError::InvalidSegment("Invalid subfolder".to_string()).into());
    }
    let resolved = state.images.resolve(category, &[subfolder, filename])?;
    serve(&state, resolved, request).await
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let category = parse_category(&category)?;
    let resolved = state.images.resolve(category, &[filename])?;
    let images = state.images.clone();

    blocking(move || images.delete(&resolved)).await?;
    Ok(MessageResponse::ok("Image deleted successfully"))
}

pub async fn delete_by_url(
    State(state): State<AppState>,
    payload: Result<Json<DeleteByUrlRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(body) = payload?;
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No URL provided".to_string()))?;
    let resolved = state.images.parse_url(&url)?;
    let images = state.images.clone();

    blocking(move || images.delete(&resolved)).await?;
    Ok(MessageResponse::ok("Image deleted successfully"))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::state::AppState;
    use crate::api::test_support::*;
    use crate::models::Category;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tower::util::ServiceExt;

    fn put(state: &AppState, category: Category, rel: &str, bytes: &[u8]) {
        let path = state.images.layout().category_dir(category).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    async fn get_bytes(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec(), content_type)
    }

    #[tokio::test]
    async fn test_list_images() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        put(&state, Category::Gallery, "top.png", b"1");
        put(&state, Category::Gallery, "outputs/gen.webp", b"2");
        put(&state, Category::Gallery, "outputs/readme.md", b"3");
        put(&state, Category::History, "other.png", b"4");

        let (status, json) = get_json(build_router(state), "/api/images/gallery").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 2);
        let images = json["images"].as_array().unwrap();
        let mut urls: Vec<&str> = images.iter().map(|i| i["url"].as_str().unwrap()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "http://localhost:3001/gallery/outputs/gen.webp",
                "http://localhost:3001/gallery/top.png",
            ]
        );
        let generated = images.iter().find(|i| i["filename"] == "gen.webp").unwrap();
        assert_eq!(generated["subfolder"], "outputs");
        assert!(generated["mtime"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_list_empty_category() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, json) =
            get_json(build_router(test_state(tmp.path())), "/api/images/history").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 0);
        assert_eq!(json["images"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_traversal_category_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        let (status, _) = get_json(app.clone(), "/api/images/..%2Fetc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app, "/api/images/..%2Fetc/passwd").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_image() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        put(&state, Category::History, "a.png", b"png-data");

        let (status, body, content_type) =
            get_bytes(build_router(state), "/api/images/history/a.png").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"png-data");
        assert_eq!(content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_get_image_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, json) =
            get_json(build_router(test_state(tmp.path())), "/api/images/history/none.png").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_image_bad_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, _) = get_json(
            build_router(test_state(tmp.path())),
            "/api/images/gallery/..%2F..%2Fsecret",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_subfolder_image() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        put(&state, Category::Gallery, "image_editor/e.jpg", b"jpg");
        let app = build_router(state);

        let (status, body, _) =
            get_bytes(app.clone(), "/api/images/gallery/image_editor/e.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"jpg");

        let (status, _) = get_json(app, "/api/images/gallery/..%2E/e.jpg").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_image() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        put(&state, Category::Gallery, "a.png", b"x");
        let path = state.images.layout().category_dir(Category::Gallery).join("a.png");
        let app = build_router(state);

        let (status, json) = delete(app.clone(), "/api/images/gallery/a.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert!(!path.exists());

        let (status, _) = delete(app, "/api/images/gallery/a.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let dir = state.images.layout().category_dir(Category::Gallery).join("upload");
        let (status, _) = delete(build_router(state), "/api/images/gallery/upload").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_delete_by_url() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        put(&state, Category::History, "upload/h.png", b"x");
        let app = build_router(state);

        let (status, _) = post_json(
            app.clone(),
            "/api/delete-by-url",
            r#"{"url": "http://localhost:3001/history/upload/h.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            app,
            "/api/delete-by-url",
            r#"{"url": "http://localhost:3001/history/upload/h.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_by_url_rejects_bad_input() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        for body in [
            r#"{}"#,
            r#"{"url": ""}"#,
            r#"{"url": "http://localhost:3001/gallery"}"#,
            r#"{"url": "http://localhost:3001/secrets/a.png"}"#,
            r#"{"url": "/gallery/../../etc/passwd"}"#,
            r#"{"url": "#,
            r#"{"url": 42}"#,
        ] {
            let (status, json) = post_json(app.clone(), "/api/delete-by-url", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json["error"]["code"], "BAD_REQUEST", "{body}");
        }
    }
}
