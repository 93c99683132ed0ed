use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Change, DriveFile, FilePatch};
use crate::services::token::{decode_change_token, encode_change_token};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File name is required")]
    MissingName,
}

/// A page of the change log plus the token for resuming after it.
#[derive(Debug, Clone)]
pub struct ChangePage {
    pub changes: Vec<Change>,
    pub new_start_page_token: String,
}

#[derive(Default)]
struct StoreInner {
    files: HashMap<String, DriveFile>,
    changes: Vec<Change>,
}

/// In-memory record store with an append-only change log.
///
/// One instance per process; handlers share it through `AppState`. The
/// single lock makes each operation atomic with respect to the others,
/// which is all the concurrency model calls for. No uniqueness constraint
/// exists on names: two concurrent creates with the same name both succeed
/// with distinct ids.
#[derive(Clone, Default)]
pub struct DriveStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl DriveStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
        }
    }

    /// Create a record. The caller resolves the name policy for its API
    /// surface before calling; an unresolved name is a validation error.
    pub async fn create_file(&self, patch: FilePatch) -> Result<DriveFile, StoreError> {
        let name = patch
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or(StoreError::MissingName)?;

        let mut inner = self.inner.write().await;
        let file = DriveFile::new(name, patch);
        inner.files.insert(file.id.clone(), file.clone());
        inner.changes.push(Change {
            file_id: file.id.clone(),
            removed: false,
            file: Some(file.clone()),
            time: Utc::now(),
        });
        Ok(file)
    }

    /// Read a record without touching version bookkeeping or the log.
    pub async fn get_file(&self, id: &str) -> Option<DriveFile> {
        let inner = self.inner.read().await;
        inner.files.get(id).cloned()
    }

    /// Shallow-merge `patch` over an existing record, bump its version and
    /// log the new snapshot. `None` when the id is unknown.
    pub async fn update_file(&self, id: &str, patch: FilePatch) -> Option<DriveFile> {
        let mut inner = self.inner.write().await;
        let file = inner.files.get_mut(id)?;
        file.apply_patch(patch);
        let snapshot = file.clone();
        inner.changes.push(Change {
            file_id: snapshot.id.clone(),
            removed: false,
            file: Some(snapshot.clone()),
            time: Utc::now(),
        });
        Some(snapshot)
    }

    /// Remove a record. A removed-change carries no file payload; the
    /// entity no longer exists. False when the id is unknown, with no
    /// change logged.
    pub async fn delete_file(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.files.remove(id).is_none() {
            return false;
        }
        inner.changes.push(Change {
            file_id: id.to_string(),
            removed: true,
            file: None,
            time: Utc::now(),
        });
        true
    }

    /// All live records, in no particular order. Filtering, sorting and
    /// pagination are the caller's pipeline.
    pub async fn list_files(&self) -> Vec<DriveFile> {
        let inner = self.inner.read().await;
        inner.files.values().cloned().collect()
    }

    /// Token for "now": changes recorded after this call are the ones a
    /// subsequent `changes_since` with this token returns.
    pub async fn start_page_token(&self) -> String {
        let inner = self.inner.read().await;
        encode_change_token(inner.changes.len())
    }

    /// All changes from the position a token encodes through the end of
    /// the log. Malformed tokens start from the beginning of the log.
    pub async fn changes_since(&self, token: &str) -> ChangePage {
        let inner = self.inner.read().await;
        let start = decode_change_token(token).min(inner.changes.len());
        ChangePage {
            changes: inner.changes[start..].to_vec(),
            new_start_page_token: encode_change_token(inner.changes.len()),
        }
    }

    /// Static user/quota descriptor served by both API surfaces.
    pub fn about(&self) -> Value {
        json!({
            "kind": "drive#about",
            "user": {
                "kind": "drive#user",
                "displayName": "Mock Drive User",
                "permissionId": "mockdrive-user",
                "emailAddress": "user@mockdrive.localhost",
                "me": true
            },
            "storageQuota": {
                "limit": "16106127360",
                "usage": "0"
            }
        })
    }

    /// Drop every record and the entire change log. Test-harness surface.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.files.clear();
        inner.changes.clear();
    }
}
