use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::api::state::AppState;
use crate::api::{blocking, ApiError, MessageResponse};

pub async fn save_data(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(value) = payload?;
    let documents = state.documents.clone();
    blocking(move || documents.save(&filename, &value)).await?;
    Ok(MessageResponse::ok("Data saved successfully"))
}

pub async fn load_data(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let documents = state.documents.clone();
    let value = blocking(move || documents.load(&filename)).await?;
    Ok(Json(value))
}

pub async fn delete_data(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let documents = state.documents.clone();
    blocking(move || documents.delete(&filename)).await?;
    Ok(MessageResponse::ok("Data deleted successfully"))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::test_support::*;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        let (status, json) = post_json(
            app.clone(),
            "/api/data/history.json",
            r#"{"entries": [{"prompt": "a cat"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (status, json) = get_json(app.clone(), "/api/data/history.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"entries": [{"prompt": "a cat"}]}));

        let (status, _) = delete(app.clone(), "/api/data/history.json").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_json(app, "/api/data/history.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_document_served_statically() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        post_json(app.clone(), "/api/data/settings.json", r#"{"theme": "dark"}"#).await;
        let (status, json) = get_json(app, "/data/settings.json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["theme"], "dark");
    }

    #[tokio::test]
    async fn test_traversal_name_stays_in_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        let (status, _) = post_json(app.clone(), "/api/data/..%2F..%2Fowned.json", "1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!tmp.path().join("owned.json").exists());
        assert!(tmp.path().join("data/....owned.json").is_file());

        let (status, _) = post_json(app, "/api/data/..", "1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        let (status, json) = post_json(app.clone(), "/api/data/broken.json", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert!(!tmp.path().join("data/broken.json").exists());

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/data/plain.json")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        let (status, json) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_missing_document() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()));

        let (status, _) = get_json(app.clone(), "/api/data/none.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete(app, "/api/data/none.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
