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
            get(get_file).patch(update_file).delete(delete_file),
        )
        .nest("/changes", super::changes::create_router().await?);

    Ok(router)
}

/// v3 wire form of a record: the serialized file plus kind and etag.
pub(crate) fn file_resource(file: &DriveFile) -> Value {
    let mut value = serde_json::to_value(file).unwrap_or_else(|_| json!({}));
    if let Some(object) = value.as_object_mut() {
        object.insert("kind".to_string(), json!("drive#file"));
        object.insert("etag".to_string(), json!(file.etag()));
    }
    value
}

async fn get_about(State(state): State<AppState>) -> Json<Value> {
    Json(state.store.about())
}

async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    tracing::debug!("v3 list request: {:?}", params);
    let page = collect_page(&state, &params).await;

    let mut body = json!({
        "kind": "drive#fileList",
        "files": page.files.iter().map(file_resource).collect::<Vec<_>>(),
    });
    if let Some(token) = page.next_page_token {
        body["nextPageToken"] = json!(token);
    }
    Json(body)
}

async fn create_file(
    State(state): State<AppState>,
    Json(mut patch): Json<FilePatch>,
) -> Result<Json<Value>, ApiError> {
    // The modern surface defaults a missing name instead of rejecting.
    if patch.name.as_deref().map_or(true, str::is_empty) {
        patch.name = Some("Untitled".to_string());
    }
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
    _headers: HeaderMap,
    Json(patch): Json<FilePatch>,
) -> Result<Json<Value>, ApiError> {
    // If-Match is deliberately not enforced here: the modern surface is
    // last-write-wins on update, matching observed service behavior.
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
