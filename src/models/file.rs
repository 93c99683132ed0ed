use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Reserved mimeType marking a record as a folder rather than a plain file.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Default mimeType for records created without one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// Keys owned by the struct fields below; stripped from incoming extra maps
// so a patch cannot smuggle duplicates past the flatten.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "name",
    "mimeType",
    "parents",
    "trashed",
    "version",
    "createdTime",
    "modifiedTime",
    "content",
    "size",
    "md5Checksum",
];

/// A stored file or folder record.
///
/// Known metadata lives in typed fields; anything else a client sends is
/// carried verbatim in `extra` and echoed back on reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
    pub version: i64,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial record used for create and update bodies. Every field is
/// optional; update merges shallowly (`parents` is wholesale-replaced).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilePatch {
    pub id: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub parents: Option<Vec<String>>,
    pub trashed: Option<bool>,
    pub content: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One observable mutation of a record. `file` is the post-mutation
/// snapshot, omitted exactly when `removed` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub file_id: String,
    pub removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<DriveFile>,
    pub time: DateTime<Utc>,
}

impl DriveFile {
    pub fn new(name: String, patch: FilePatch) -> Self {
        let now = Utc::now();
        let mut file = Self {
            id: patch.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name,
            mime_type: patch
                .mime_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            parents: patch.parents.unwrap_or_default(),
            trashed: patch.trashed.unwrap_or(false),
            version: 1,
            created_time: now,
            modified_time: now,
            content: patch.content,
            size: None,
            md5_checksum: None,
            extra: filter_reserved(patch.extra),
        };
        file.refresh_content_digest();
        file
    }

    /// Shallow-merge `patch` over this record and bump the version. The id
    /// is immutable; an id in the patch is ignored.
    pub fn apply_patch(&mut self, patch: FilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(mime_type) = patch.mime_type {
            self.mime_type = mime_type;
        }
        if let Some(parents) = patch.parents {
            self.parents = parents;
        }
        if let Some(trashed) = patch.trashed {
            self.trashed = trashed;
        }
        if let Some(content) = patch.content {
            self.content = Some(content);
            self.refresh_content_digest();
        }
        for (key, value) in filter_reserved(patch.extra) {
            self.extra.insert(key, value);
        }

        self.version += 1;
        self.touch();
    }

    /// Whether this record is a folder (the reserved container mimeType).
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Opaque concurrency token derived from the version counter.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.version)
    }

    fn refresh_content_digest(&mut self) {
        match &self.content {
            Some(content) => {
                let bytes = content_bytes(content);
                self.size = Some(bytes.len() as i64);
                self.md5_checksum = Some(format!("{:x}", md5::compute(&bytes)));
            }
            None => {
                self.size = None;
                self.md5_checksum = None;
            }
        }
    }

    // modified_time must end up strictly greater than the previous
    // snapshot's even when the clock has not advanced between mutations.
    fn touch(&mut self) {
        let now = Utc::now();
        self.modified_time = if now > self.modified_time {
            now
        } else {
            self.modified_time + Duration::microseconds(1)
        };
    }
}

/// Byte serialization of a content payload: string content hashes its
/// UTF-8 bytes, structured content its JSON serialization.
fn content_bytes(content: &Value) -> Vec<u8> {
    match content {
        Value::String(s) => s.as_bytes().to_vec(),
        other => serde_json::to_vec(other).unwrap_or_default(),
    }
}

fn filter_reserved(extra: Map<String, Value>) -> Map<String, Value> {
    extra
        .into_iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .collect()
}
