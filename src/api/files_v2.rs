//! Legacy API surface: `title` is the wire name for `name`, list responses
//! use `items`, and conditional updates are enforced (unlike v3).

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::models::{DriveFile, FilePatch};

use super::error::ApiError;
use super::{check_precondition, collect_page, AppState, ListParams};

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/about", get(get_about))
        .route("/files", get(list_files).post(create_file))
        .route(
            "/files/{id}",
            get(get_file).put(update_file).delete(delete_file),
        )
        .nest("/changes", super::changes::create_router().await?);

    Ok(router)
}

/// v2 wire form: the v3 resource with `name` rewritten to `title`.
fn file_resource(file: &DriveFile) -> Value {
    let mut value = super::files_v3::file_resource(file);
    if let Some(object) = value.as_object_mut() {
        if let Some(name) = object.remove("name") {
            object.insert("title".to_string(), name);
        }
    }
    value
}

/// Translate a legacy request body into a patch (`title` -> `name`).
fn parse_patch(mut body: Value) -> Result<FilePatch, ApiError> {
    if let Some(object) = body.as_object_mut() {
        if let Some(title) = object.remove("title") {
            object.insert("name".to_string(), title);
        }
    }
    serde_json::from_value(body).map_err(|err| ApiError::Validation(err.to_string()))
}

async fn get_about(State(state): State<AppState>) -> Json<Value> {
    Json(state.store.about())
}

async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    tracing::debug!("v2 list request: {:?}", params);
    let page = collect_page(&state, &params).await;

    let mut body = json!({
        "kind": "drive#fileList",
        "items": page.files.iter().map(file_resource).collect::<Vec<_>>(),
    });
    if let Some(token) = page.next_page_token {
        body["nextPageToken"] = json!(token);
    }
    Json(body)
}

async fn create_file(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    // The legacy surface requires a title; no default is supplied.
    let patch = parse_patch(body)?;
    let file = state.store.create_file(patch).await?;
    Ok(Json(file_resource(&file)))
}

async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let file = state
        .store
        .get_file(&id)
        .await
        .ok_or(ApiError::NotFound(id))?;
    Ok(Json(file_resource(&file)))
}

async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    check_precondition(&state, &headers, &id).await?;
    let patch = parse_patch(body)?;
    let file = state
        .store
        .update_file(&id, patch)
        .await
        .ok_or(ApiError::NotFound(id))?;
    Ok(Json(file_resource(&file)))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    check_precondition(&state, &headers, &id).await?;
    if state.store.delete_file(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}
