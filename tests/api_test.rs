use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use mockdrive_rs::api::{self, AppState};
use mockdrive_rs::{AppConfig, DriveStore};
use serde_json::{json, Value};

async fn test_server() -> TestServer {
    let state = AppState {
        store: DriveStore::new(),
        config: AppConfig::default(),
    };
    let app = axum::Router::new()
        .merge(api::create_router().await.expect("Failed to create router"))
        .with_state(state);
    TestServer::new(app).expect("Failed to create test server")
}

fn if_match(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap()
}

#[tokio::test]
async fn test_end_to_end_lifecycle() {
    let server = test_server().await;

    let start_token = server
        .get("/drive/v3/changes/startPageToken")
        .await
        .json::<Value>()["startPageToken"]
        .as_str()
        .unwrap()
        .to_string();

    // Create
    let created: Value = server
        .post("/drive/v3/files")
        .json(&json!({"name": "a.txt"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["version"], json!(1));
    assert_eq!(created["kind"], json!("drive#file"));

    // Update
    let updated: Value = server
        .patch(&format!("/drive/v3/files/{id}"))
        .json(&json!({"name": "b.txt"}))
        .await
        .json();
    assert_eq!(updated["version"], json!(2));
    assert_eq!(updated["name"], json!("b.txt"));

    // Query for the updated record
    let listed: Value = server
        .get("/drive/v3/files")
        .add_query_param("q", "name = 'b.txt' and trashed = false")
        .await
        .json();
    let files = listed["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], json!(id.clone()));

    // Delete, then observe the record is gone
    let response = server.delete(&format!("/drive/v3/files/{id}")).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server.get(&format!("/drive/v3/files/{id}")).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let listed: Value = server.get("/drive/v3/files").await.json();
    assert!(listed["files"].as_array().unwrap().is_empty());

    // The change feed holds create, update and removal for this id
    let changes_body: Value = server
        .get("/drive/v3/changes")
        .add_query_param("pageToken", &start_token)
        .await
        .json();
    let changes = changes_body["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 3);
    assert!(changes.iter().all(|c| c["fileId"] == json!(id.clone())));
    assert_eq!(changes[0]["removed"], json!(false));
    assert_eq!(changes[1]["file"]["name"], json!("b.txt"));
    assert_eq!(changes[2]["removed"], json!(true));
    assert!(changes[2].get("file").is_none());
}

#[tokio::test]
async fn test_v3_update_ignores_if_match() {
    let server = test_server().await;

    let created: Value = server
        .post("/drive/v3/files")
        .json(&json!({"name": "a.txt"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    // Stale precondition, but the modern surface is last-write-wins.
    let response = server
        .patch(&format!("/drive/v3/files/{id}"))
        .add_header(header::IF_MATCH, if_match("\"999\""))
        .json(&json!({"name": "b.txt"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["name"], json!("b.txt"));
}

#[tokio::test]
async fn test_v3_delete_enforces_if_match() {
    let server = test_server().await;

    let created: Value = server
        .post("/drive/v3/files")
        .json(&json!({"name": "a.txt"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let response = server
        .delete(&format!("/drive/v3/files/{id}"))
        .add_header(header::IF_MATCH, if_match("\"999\""))
        .await;
    assert_eq!(response.status_code(), StatusCode::PRECONDITION_FAILED);

    // The record survived the failed delete.
    let response = server.get(&format!("/drive/v3/files/{id}")).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Wildcard and the current etag both pass.
    let response = server
        .delete(&format!("/drive/v3/files/{id}"))
        .add_header(header::IF_MATCH, if_match("\"1\""))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_v2_update_enforces_if_match() {
    let server = test_server().await;

    let created: Value = server
        .post("/drive/v2/files")
        .json(&json!({"title": "legacy.txt"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let response = server
        .put(&format!("/drive/v2/files/{id}"))
        .add_header(header::IF_MATCH, if_match("\"999\""))
        .json(&json!({"title": "renamed.txt"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::PRECONDITION_FAILED);

    let response = server
        .put(&format!("/drive/v2/files/{id}"))
        .add_header(header::IF_MATCH, if_match("\"1\""))
        .json(&json!({"title": "renamed.txt"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["title"], json!("renamed.txt"));
}

#[tokio::test]
async fn test_v2_delete_enforces_if_match() {
    let server = test_server().await;

    let created: Value = server
        .post("/drive/v2/files")
        .json(&json!({"title": "legacy.txt"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let response = server
        .delete(&format!("/drive/v2/files/{id}"))
        .add_header(header::IF_MATCH, if_match("\"2\""))
        .await;
    assert_eq!(response.status_code(), StatusCode::PRECONDITION_FAILED);

    let response = server
        .delete(&format!("/drive/v2/files/{id}"))
        .add_header(header::IF_MATCH, if_match("*"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_v2_uses_title_and_items() {
    let server = test_server().await;

    let created: Value = server
        .post("/drive/v2/files")
        .json(&json!({"title": "legacy.txt"}))
        .await
        .json();
    assert_eq!(created["title"], json!("legacy.txt"));
    assert!(created.get("name").is_none());

    let listed: Value = server
        .get("/drive/v2/files")
        .add_query_param("q", "title = 'legacy.txt'")
        .await
        .json();
    let items = listed["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], json!("legacy.txt"));

    // The legacy surface requires a title.
    let response = server.post("/drive/v2/files").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], json!(400));
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_v3_create_defaults_missing_name() {
    let server = test_server().await;

    let created: Value = server.post("/drive/v3/files").json(&json!({})).await.json();
    assert_eq!(created["name"], json!("Untitled"));
    assert_eq!(created["mimeType"], json!("application/octet-stream"));
}

#[tokio::test]
async fn test_list_pagination_tokens() {
    let server = test_server().await;

    for name in ["a", "b", "c", "d", "e"] {
        server
            .post("/drive/v3/files")
            .json(&json!({"name": name}))
            .await;
    }

    let mut seen = Vec::new();

    let page: Value = server
        .get("/drive/v3/files")
        .add_query_param("orderBy", "name")
        .add_query_param("pageSize", "2")
        .await
        .json();
    assert_eq!(page["files"].as_array().unwrap().len(), 2);
    let token = page["nextPageToken"].as_str().unwrap().to_string();
    seen.extend(collect_names(&page, "files"));

    let page: Value = server
        .get("/drive/v3/files")
        .add_query_param("orderBy", "name")
        .add_query_param("pageSize", "2")
        .add_query_param("pageToken", &token)
        .await
        .json();
    assert_eq!(page["files"].as_array().unwrap().len(), 2);
    let token = page["nextPageToken"].as_str().unwrap().to_string();
    seen.extend(collect_names(&page, "files"));

    // Final page: one record left and no further token.
    let page: Value = server
        .get("/drive/v3/files")
        .add_query_param("orderBy", "name")
        .add_query_param("pageSize", "2")
        .add_query_param("pageToken", &token)
        .await
        .json();
    assert_eq!(page["files"].as_array().unwrap().len(), 1);
    assert!(page.get("nextPageToken").is_none());
    seen.extend(collect_names(&page, "files"));

    assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);

    // A garbage token falls back to the first page.
    let page: Value = server
        .get("/drive/v3/files")
        .add_query_param("orderBy", "name")
        .add_query_param("pageSize", "2")
        .add_query_param("pageToken", "!!!not-a-token!!!")
        .await
        .json();
    assert_eq!(collect_names(&page, "files"), vec!["a", "b"]);
}

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let server = test_server().await;

    for (name, mime) in [
        ("zebra", "application/vnd.google-apps.folder"),
        ("apple.txt", "text/plain"),
        ("acorn", "application/vnd.google-apps.folder"),
    ] {
        server
            .post("/drive/v3/files")
            .json(&json!({"name": name, "mimeType": mime}))
            .await;
    }

    let listed: Value = server
        .get("/drive/v3/files")
        .add_query_param("orderBy", "folder,name")
        .await
        .json();
    assert_eq!(
        collect_names(&listed, "files"),
        vec!["acorn", "zebra", "apple.txt"]
    );

    let filtered: Value = server
        .get("/drive/v3/files")
        .add_query_param(
            "q",
            "mimeType = 'application/vnd.google-apps.folder' and name contains 'a'",
        )
        .add_query_param("orderBy", "name")
        .await
        .json();
    assert_eq!(collect_names(&filtered, "files"), vec!["acorn", "zebra"]);
}

#[tokio::test]
async fn test_changes_feed_over_http() {
    let server = test_server().await;

    let start: Value = server.get("/drive/v2/changes/startPageToken").await.json();
    let token = start["startPageToken"].as_str().unwrap().to_string();

    server
        .post("/drive/v3/files")
        .json(&json!({"name": "a.txt"}))
        .await;

    // Both surfaces read the same feed.
    let body: Value = server
        .get("/drive/v2/changes")
        .add_query_param("pageToken", &token)
        .await
        .json();
    assert_eq!(body["kind"], json!("drive#changeList"));
    assert_eq!(body["changes"].as_array().unwrap().len(), 1);
    assert!(body["newStartPageToken"].is_string());
}

#[tokio::test]
async fn test_reset_clears_the_store() {
    let server = test_server().await;

    server
        .post("/drive/v3/files")
        .json(&json!({"name": "a.txt"}))
        .await;

    let response = server.post("/reset").await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let listed: Value = server.get("/drive/v3/files").await.json();
    assert!(listed["files"].as_array().unwrap().is_empty());

    let start: Value = server.get("/drive/v3/changes/startPageToken").await.json();
    assert_eq!(start["startPageToken"], json!("1"));
}

#[tokio::test]
async fn test_about_descriptor() {
    let server = test_server().await;

    let about: Value = server.get("/drive/v3/about").await.json();
    assert_eq!(about["kind"], json!("drive#about"));
    assert_eq!(about["user"]["me"], json!(true));

    let legacy: Value = server.get("/drive/v2/about").await.json();
    assert_eq!(legacy, about);
}

#[tokio::test]
async fn test_not_found_error_shape() {
    let server = test_server().await;

    let response = server.get("/drive/v3/files/does-not-exist").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["status"], json!(404));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("does-not-exist"));
}

fn collect_names(page: &Value, key: &str) -> Vec<String> {
    page[key]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().or(f["title"].as_str()).unwrap().to_string())
        .collect()
}
