pub mod changes;
pub mod error;
pub mod files_v2;
pub mod files_v3;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::models::DriveFile;
use crate::services::token::{decode_page_token, encode_page_token};
use crate::services::{order, query, DriveStore};

use error::ApiError;

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: DriveStore,
    pub config: AppConfig,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/reset", post(reset_handler))
        .nest("/drive/v3", files_v3::create_router().await?)
        .nest("/drive/v2", files_v2::create_router().await?);

    Ok(router)
}

// Test-harness surface: drop all records and the change log.
async fn reset_handler(State(state): State<AppState>) -> StatusCode {
    state.store.clear().await;
    StatusCode::NO_CONTENT
}

/// List query parameters shared by both API surfaces.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub q: Option<String>,
    pub order_by: Option<String>,
    pub page_size: Option<usize>,
    pub page_token: Option<String>,
    // Accepted for client compatibility; field selection is not applied.
    #[allow(dead_code)]
    pub fields: Option<String>,
}

/// One page of the list pipeline: filter, sort, then paginate.
pub(crate) struct ListPage {
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

pub(crate) async fn collect_page(state: &AppState, params: &ListParams) -> ListPage {
    let mut files = state.store.list_files().await;

    if let Some(q) = params.q.as_deref() {
        files.retain(|file| query::matches(q, file));
    }
    if let Some(order_by) = params.order_by.as_deref() {
        files.sort_by(|a, b| order::compare(order_by, a, b));
    }

    let skip = params
        .page_token
        .as_deref()
        .map(decode_page_token)
        .unwrap_or(0);
    let page_size = params
        .page_size
        .unwrap_or(state.config.paging.default_page_size)
        .clamp(1, state.config.paging.max_page_size);

    let next_page_token = if skip + page_size < files.len() {
        Some(encode_page_token(skip + page_size))
    } else {
        None
    };

    ListPage {
        files: files.into_iter().skip(skip).take(page_size).collect(),
        next_page_token,
    }
}

/// Check an `If-Match` precondition against the current record state.
/// Used only by the surfaces that enforce preconditions; `*` always
/// passes, as does an absent header.
pub(crate) async fn check_precondition(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<(), ApiError> {
    let expected = match headers.get(header::IF_MATCH).and_then(|v| v.to_str().ok()) {
        Some(expected) if expected != "*" => expected,
        _ => return Ok(()),
    };

    let file = state
        .store
        .get_file(id)
        .await
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;

    if expected != file.etag() {
        tracing::debug!(
            "If-Match mismatch for {}: got {}, current {}",
            id,
            expected,
            file.etag()
        );
        return Err(ApiError::PreconditionFailed(id.to_string()));
    }
    Ok(())
}
