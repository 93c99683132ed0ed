use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesParams {
    pub page_token: Option<String>,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/", get(list_changes))
        .route("/startPageToken", get(get_start_page_token));

    Ok(router)
}

async fn list_changes(
    State(state): State<AppState>,
    Query(params): Query<ChangesParams>,
) -> Json<Value> {
    // A missing or malformed token replays the log from the beginning.
    let token = params.page_token.unwrap_or_default();
    let page = state.store.changes_since(&token).await;

    Json(json!({
        "kind": "drive#changeList",
        "changes": page.changes,
        "newStartPageToken": page.new_start_page_token,
    }))
}

async fn get_start_page_token(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "kind": "drive#startPageToken",
        "startPageToken": state.store.start_page_token().await,
    }))
}
