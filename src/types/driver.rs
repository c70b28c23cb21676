//! Response types returned by database operations.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A fetched document.
#[derive(Debug, Clone)]
pub struct DocumentResponse {
    /// Revision from the ETag header
    pub rev: String,
    /// Content-Length reported by the server
    pub content_length: Option<u64>,
    /// Raw JSON body
    pub body: Bytes,
}

impl DocumentResponse {
    /// Decode the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// One row of a view or `_all_docs` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Row {
    /// Source document ID (absent for reduce rows)
    #[serde(default)]
    pub id: Option<String>,
    /// Emitted key
    #[serde(default)]
    pub key: Value,
    /// Emitted value
    #[serde(default)]
    pub value: Value,
    /// Included document, with `include_docs=true`
    #[serde(default)]
    pub doc: Option<Value>,
    /// Per-row error (e.g. `not_found` for missing keys)
    #[serde(default)]
    pub error: Option<String>,
}

/// A view or `_all_docs` result set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rows {
    /// Total rows in the view
    #[serde(default)]
    pub total_rows: Option<u64>,
    /// Offset of the first returned row
    #[serde(default)]
    pub offset: Option<u64>,
    /// Update sequence, when requested
    #[serde(default)]
    pub update_seq: Option<Value>,
    /// Returned rows
    pub rows: Vec<Row>,
}

/// Database statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbStats {
    /// Database name
    #[serde(rename = "db_name")]
    pub name: String,
    /// Live documents
    pub doc_count: u64,
    /// Deleted documents
    #[serde(rename = "doc_del_count")]
    pub deleted_count: u64,
    /// Current update sequence, unquoted
    #[serde(skip)]
    pub update_seq: String,
    /// Whether compaction is running
    pub compact_running: bool,
    /// File size on disk
    pub disk_size: u64,
    /// Size of live data
    #[serde(rename = "data_size")]
    pub active_size: u64,
    /// Uncompressed size of live data
    #[serde(skip)]
    pub external_size: u64,
}

/// Names and roles granted a level of access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    /// User names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    /// Role names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// A database security object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Database admins
    #[serde(default)]
    pub admins: Members,
    /// Database members
    #[serde(default)]
    pub members: Members,
}

/// Attachment metadata from a HEAD request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// MIME type
    pub content_type: String,
    /// Size in bytes
    pub size: Option<u64>,
    /// Digest from the ETag header
    pub digest: Option<String>,
}
