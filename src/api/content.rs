//! Record endpoints under `/content/:apiId`

use crate::api::{bad_body, parse_id, ApiResponse, AppState};
use crate::error::{ContentError, Result};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;

pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = body.map_err(bad_body)?;
    let record = state.content.create(&api_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<String>,
) -> Result<impl IntoResponse> {
    let records = state.content.find_all(&api_id).await?;
    Ok(Json(ApiResponse::success(records)))
}

/// The body is a filter map; an empty body searches without filters
pub async fn search_records(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let filters: Option<Map<String, Value>> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let value: Value = serde_json::from_slice(&body).map_err(|e| ContentError::InvalidRequest {
            message: format!("Invalid filter body: {}", e),
        })?;
        match value {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => {
                return Err(ContentError::InvalidRequest {
                    message: "Filter must be a JSON object".to_string(),
                })
            }
        }
    };

    let records = state.content.search(&api_id, filters.as_ref()).await?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((api_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let record = state.content.find_by_id(&api_id, parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((api_id, id)): Path<(String, String)>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id)?;
    let Json(payload) = body.map_err(bad_body)?;
    let record = state.content.update(&api_id, id, &payload).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((api_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.content.delete(&api_id, parse_id(&id)?).await?;
    Ok(Json(ApiResponse::<()>::with_message("Content deleted", None)))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{app, create_author, send};
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_lifecycle_over_http() {
        let app = app().await;
        create_author(&app).await;

        let (status, body) = send(&app, "POST", "/content/author", Some(json!({"name": "Jane"}))).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["name"], json!("Jane"));
        assert_eq!(body["data"]["bio"], json!(null));
        assert!(body["data"]["created_at"].is_string());

        let uri = format!("/content/author/{}", id);
        let (status, body) = send(&app, "PUT", &uri, Some(json!({"bio": "x"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], json!("Jane"));
        assert_eq!(body["data"]["bio"], json!("x"));

        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["bio"], json!("x"));

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("not_found"));
    }

    #[tokio::test]
    async fn test_search_over_http() {
        let app = app().await;
        create_author(&app).await;
        for name in ["Jane", "John"] {
            send(&app, "POST", "/content/author", Some(json!({ "name": name }))).await;
        }

        let (status, body) = send(&app, "POST", "/content/author/search", Some(json!({"name": "Jane"}))).await;
        assert_eq!(status, StatusCode::OK);
        let found = body["data"].as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], json!("Jane"));

        let (_, all) = send(&app, "GET", "/content/author", None).await;
        let (_, empty_filter) = send(&app, "POST", "/content/author/search", Some(json!({}))).await;
        let (_, no_body) = send(&app, "POST", "/content/author/search", None).await;
        assert_eq!(all["data"].as_array().unwrap().len(), 2);
        assert_eq!(empty_filter["data"], all["data"]);
        assert_eq!(no_body["data"], all["data"]);

        let (status, body) = send(&app, "POST", "/content/author/search", Some(json!({"age": 3}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("invalid_schema"));

        let (status, _) = send(&app, "POST", "/content/author/search", Some(json!(["Jane"]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_record_errors_over_http() {
        let app = app().await;
        create_author(&app).await;

        let (status, _) = send(&app, "GET", "/content/author/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "PUT", "/content/author/99", Some(json!({"bio": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "POST", "/content/author", Some(json!({"bio": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("invalid_schema"));

        let (status, _) = send(&app, "GET", "/content/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/content/ghost", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
