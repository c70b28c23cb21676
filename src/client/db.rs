//! Database-level operations.
//!
//! [`Database`] maps the document-store driver contract onto CouchDB's HTTP
//! API. Documents with attachments are uploaded as one streamed
//! `multipart/related` request.
//!
//! # Examples
//!
//! ```ignore
//! use couchdb_stream_http::{Attachment, CouchClient, Document, QueryOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CouchClient::connect("http://localhost:5984").await?;
//!     let db = client.db("photos")?;
//!
//!     let doc = Document::new()
//!         .with_field("title", json!("Beach"))
//!         .with_attachment("beach.jpg", Attachment::from_bytes("image/jpeg", std::fs::read("beach.jpg")?));
//!     let rev = db.put("beach", doc, QueryOptions::new()).await?;
//!     println!("stored revision {}", rev);
//!     Ok(())
//! }
//! ```

use super::transport::{decode_json, get_rev, read_body, CouchClient, RequestOptions};
use super::utils::doc_id_segments;
use crate::error::{CouchError, EncodeError, Result};
use crate::multipart::{
    document_stream, encode_upload_with_capacity, extract_attachments, pipe, DetachAttachments,
};
use crate::protocol::constants::media_types;
use crate::protocol::{options_to_params, take_full_commit, take_if_none_match, QueryOptions};
use crate::types::{Attachment, AttachmentMeta, DbStats, DocumentResponse, Rows, Security};
use futures::{StreamExt, TryStreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

const DB_NAME_PATTERN: &str = r"^[a-z][a-z0-9_$()+/-]*$";
const SYSTEM_DATABASES: [&str; 3] = ["_users", "_replicator", "_global_changes"];

fn validate_db_name(name: &str) -> Result<()> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    if name.is_empty() {
        return Err(CouchError::missing_arg("dbName"));
    }
    let pattern = PATTERN
        .get_or_init(|| Regex::new(DB_NAME_PATTERN))
        .as_ref()
        .map_err(|e| CouchError::bad_api_call(e.to_string()))?;
    if pattern.is_match(name) || SYSTEM_DATABASES.contains(&name) {
        Ok(())
    } else {
        Err(CouchError::bad_api_call(format!("invalid database name '{}'", name)))
    }
}

/// Write result returned by document and attachment updates.
#[derive(Debug, Deserialize)]
struct DocResult {
    #[serde(default)]
    id: String,
    #[serde(default)]
    rev: String,
}

/// Stats body as returned by the server, before merging.
#[derive(Debug, Default, Deserialize)]
struct StatsBody {
    #[serde(flatten)]
    stats: DbStats,
    #[serde(default)]
    sizes: Sizes,
    #[serde(default)]
    update_seq: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sizes {
    file: u64,
    external: u64,
    active: u64,
}

impl StatsBody {
    fn into_stats(self) -> DbStats {
        let mut stats = self.stats;
        if self.sizes.file > 0 {
            stats.disk_size = self.sizes.file;
        }
        if self.sizes.external > 0 {
            stats.external_size = self.sizes.external;
        }
        if self.sizes.active > 0 {
            stats.active_size = self.sizes.active;
        }
        stats.update_seq = match self.update_seq {
            Value::String(seq) => seq,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        stats
    }
}

impl CouchClient {
    /// Handle to a database. The name is validated but not checked for
    /// existence.
    pub fn db(&self, name: &str) -> Result<Database> {
        validate_db_name(name)?;
        Ok(Database {
            client: self.clone(),
            name: name.to_string(),
        })
    }

    /// Names of all databases on the server.
    pub async fn all_dbs(&self) -> Result<Vec<String>> {
        self.do_json(Method::GET, &["_all_dbs"], RequestOptions::default())
            .await
    }

    /// Whether a database exists.
    pub async fn db_exists(&self, name: &str) -> Result<bool> {
        validate_db_name(name)?;
        match self
            .do_error(Method::HEAD, &[name], RequestOptions::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Create a database.
    pub async fn create_db(&self, name: &str, opts: QueryOptions) -> Result<Database> {
        let db = self.db(name)?;
        let request = RequestOptions::default().with_query(options_to_params(&opts)?);
        self.do_error(Method::PUT, &[name], request).await?;
        Ok(db)
    }

    /// Delete a database.
    pub async fn destroy_db(&self, name: &str) -> Result<()> {
        validate_db_name(name)?;
        self.do_error(Method::DELETE, &[name], RequestOptions::default())
            .await?;
        Ok(())
    }
}

/// A database on a CouchDB server.
#[derive(Debug, Clone)]
pub struct Database {
    client: CouchClient,
    name: String,
}

impl Database {
    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client this database belongs to.
    pub fn client(&self) -> &CouchClient {
        &self.client
    }

    fn path<'a>(&'a self, rest: &[&'a str]) -> Vec<&'a str> {
        let mut path = Vec::with_capacity(rest.len() + 1);
        path.push(self.name.as_str());
        path.extend_from_slice(rest);
        path
    }

    fn doc_path<'a>(&'a self, id: &'a str) -> Vec<&'a str> {
        self.path(&doc_id_segments(id))
    }

    async fn rows_query(&self, path: &[&str], opts: &QueryOptions) -> Result<Rows> {
        let request = RequestOptions::default().with_query(options_to_params(opts)?);
        self.client.do_json(Method::GET, &self.path(path), request).await
    }

    /// All documents in the database.
    pub async fn all_docs(&self, opts: QueryOptions) -> Result<Rows> {
        self.rows_query(&["_all_docs"], &opts).await
    }

    /// Query a view. `ddoc` may be given with or without its `_design/` prefix.
    pub async fn query(&self, ddoc: &str, view: &str, opts: QueryOptions) -> Result<Rows> {
        let ddoc = ddoc.strip_prefix("_design/").unwrap_or(ddoc);
        if ddoc.is_empty() {
            return Err(CouchError::missing_arg("ddoc"));
        }
        if view.is_empty() {
            return Err(CouchError::missing_arg("view"));
        }
        self.rows_query(&["_design", ddoc, "_view", view], &opts)
            .await
    }

    async fn fetch(
        &self,
        method: Method,
        id: &str,
        mut opts: QueryOptions,
    ) -> Result<reqwest::Response> {
        if id.is_empty() {
            return Err(CouchError::missing_arg("docID"));
        }
        let if_none_match = take_if_none_match(&mut opts)?;
        let request = RequestOptions {
            accept: Some(media_types::JSON.to_string()),
            if_none_match,
            query: options_to_params(&opts)?,
            ..Default::default()
        };
        self.client.do_error(method, &self.doc_path(id), request).await
    }

    /// Fetch a document.
    pub async fn get(&self, id: &str, opts: QueryOptions) -> Result<DocumentResponse> {
        let response = self.fetch(Method::GET, id, opts).await?;
        let rev = get_rev(&response)?;
        let content_length = header_u64(&response, CONTENT_LENGTH);
        let body = read_body(response).await?;
        Ok(DocumentResponse {
            rev,
            content_length,
            body,
        })
    }

    /// Size and current revision of a document, without its body.
    pub async fn get_meta(&self, id: &str, opts: QueryOptions) -> Result<(Option<u64>, String)> {
        let response = self.fetch(Method::HEAD, id, opts).await?;
        let rev = get_rev(&response)?;
        Ok((header_u64(&response, CONTENT_LENGTH), rev))
    }

    /// Create a document with a server-assigned ID. Returns `(id, rev)`.
    pub async fn create_doc<D: Serialize>(&self, doc: &D, mut opts: QueryOptions) -> Result<(String, String)> {
        let full_commit = take_full_commit(&mut opts, false)?;
        let request = RequestOptions::json(doc)?
            .with_full_commit(full_commit)
            .with_query(options_to_params(&opts)?);
        let result: DocResult = self.client.do_json(Method::POST, &self.path(&[]), request).await?;
        Ok((result.id, result.rev))
    }

    /// Create or update a document, returning its new revision.
    ///
    /// Attachments held by the document are detached and uploaded in the
    /// same request as a streamed `multipart/related` body; the document's
    /// attachments field is left empty afterwards. Pass `&mut doc` to keep
    /// ownership.
    pub async fn put<D>(&self, id: &str, mut doc: D, mut opts: QueryOptions) -> Result<String>
    where
        D: Serialize + DetachAttachments,
    {
        if id.is_empty() {
            return Err(CouchError::missing_arg("docID"));
        }
        let full_commit = take_full_commit(&mut opts, false)?;
        let mut request = RequestOptions::default()
            .with_full_commit(full_commit)
            .with_query(options_to_params(&opts)?);

        match extract_attachments(&mut doc) {
            Some(attachments) => {
                if self.client.config().enable_logging {
                    tracing::debug!(
                        "uploading '{}' with {} attachment(s)",
                        id,
                        attachments.len()
                    );
                }
                let upload = encode_upload_with_capacity(
                    document_stream(&doc)?,
                    attachments,
                    self.client.config().pipe_capacity,
                );
                let (content_type, body) = upload.into_parts();
                request.content_type = Some(content_type);
                request.body = Some(reqwest::Body::wrap_stream(body));
            }
            None => {
                request.body = Some(serde_json::to_vec(&doc)?.into());
            }
        }

        let result: DocResult = self
            .client
            .do_json(Method::PUT, &self.doc_path(id), request)
            .await?;
        if result.id != id {
            return Err(CouchError::BadResponse(format!(
                "modified document ID ({}) does not match that requested ({})",
                result.id, id
            )));
        }
        Ok(result.rev)
    }

    /// Delete a document, returning the deletion revision.
    pub async fn delete(&self, id: &str, rev: &str, mut opts: QueryOptions) -> Result<String> {
        if id.is_empty() {
            return Err(CouchError::missing_arg("docID"));
        }
        if rev.is_empty() {
            return Err(CouchError::missing_arg("rev"));
        }
        let full_commit = take_full_commit(&mut opts, false)?;
        let mut query = options_to_params(&opts)?;
        query.push(("rev".to_string(), rev.to_string()));
        let request = RequestOptions::default()
            .with_full_commit(full_commit)
            .with_query(query);
        let response = self
            .client
            .do_error(Method::DELETE, &self.doc_path(id), request)
            .await?;
        get_rev(&response)
    }

    /// Copy a document, returning the target's new revision.
    pub async fn copy(&self, target_id: &str, source_id: &str, mut opts: QueryOptions) -> Result<String> {
        if source_id.is_empty() {
            return Err(CouchError::missing_arg("sourceID"));
        }
        if target_id.is_empty() {
            return Err(CouchError::missing_arg("targetID"));
        }
        let full_commit = take_full_commit(&mut opts, false)?;
        let request = RequestOptions {
            full_commit,
            destination: Some(target_id.to_string()),
            query: options_to_params(&opts)?,
            ..Default::default()
        };
        let method = Method::from_bytes(b"COPY").map_err(|e| CouchError::bad_api_call(e.to_string()))?;
        let response = self
            .client
            .do_error(method, &self.doc_path(source_id), request)
            .await?;
        get_rev(&response)
    }

    /// Ask the server to commit recent changes to disk.
    pub async fn flush(&self) -> Result<()> {
        self.post_command(&["_ensure_full_commit"]).await
    }

    /// Start database compaction.
    pub async fn compact(&self) -> Result<()> {
        self.post_command(&["_compact"]).await
    }

    /// Start compaction of one design document's views.
    pub async fn compact_view(&self, ddoc: &str) -> Result<()> {
        if ddoc.is_empty() {
            return Err(CouchError::missing_arg("ddocID"));
        }
        self.post_command(&["_compact", ddoc]).await
    }

    /// Remove index files no longer used by any view.
    pub async fn view_cleanup(&self) -> Result<()> {
        self.post_command(&["_view_cleanup"]).await
    }

    async fn post_command(&self, path: &[&str]) -> Result<()> {
        self.client
            .do_error(Method::POST, &self.path(path), RequestOptions::default())
            .await?;
        Ok(())
    }

    /// Database statistics.
    pub async fn stats(&self) -> Result<DbStats> {
        let body: StatsBody = self
            .client
            .do_json(Method::GET, &self.path(&[]), RequestOptions::default())
            .await?;
        Ok(body.into_stats())
    }

    /// The database security object.
    pub async fn security(&self) -> Result<Security> {
        self.client
            .do_json(Method::GET, &self.path(&["_security"]), RequestOptions::default())
            .await
    }

    /// Replace the database security object.
    pub async fn set_security(&self, security: &Security) -> Result<()> {
        self.client
            .do_error(
                Method::PUT,
                &self.path(&["_security"]),
                RequestOptions::json(security)?,
            )
            .await?;
        Ok(())
    }

    fn attachment_path<'a>(&'a self, id: &'a str, name: &'a str) -> Result<Vec<&'a str>> {
        if id.is_empty() {
            return Err(CouchError::missing_arg("docID"));
        }
        if name.is_empty() {
            return Err(CouchError::missing_arg("filename"));
        }
        let mut path = self.doc_path(id);
        path.push(name);
        Ok(path)
    }

    /// Upload a single attachment, returning the document's new revision.
    ///
    /// An attachment without a known size is read into memory first so the
    /// request can carry a `Content-Length`.
    pub async fn put_attachment(
        &self,
        id: &str,
        rev: &str,
        name: &str,
        mut attachment: Attachment,
        mut opts: QueryOptions,
    ) -> Result<String> {
        let path = self.attachment_path(id, name)?;
        let size = attachment
            .ensure_size()
            .await
            .map_err(|e| EncodeError::attachment_read(name, e))?;
        let mut content = attachment
            .take_content()
            .ok_or_else(|| EncodeError::AttachmentConsumed(name.to_string()))?;

        let full_commit = take_full_commit(&mut opts, false)?;
        let mut query = options_to_params(&opts)?;
        if !rev.is_empty() {
            query.push(("rev".to_string(), rev.to_string()));
        }

        let attachment_name = name.to_string();
        let body = pipe(self.client.config().pipe_capacity, move |mut writer| async move {
            while let Some(chunk) = content.next().await {
                let chunk = chunk.map_err(|e| EncodeError::attachment_read(&attachment_name, e))?;
                writer.write(chunk).await?;
            }
            Ok::<_, EncodeError>(())
        });

        let request = RequestOptions {
            content_type: Some(attachment.content_type.clone()),
            content_length: Some(size),
            body: Some(reqwest::Body::wrap_stream(body)),
            full_commit,
            query,
            ..Default::default()
        };
        let result: DocResult = self.client.do_json(Method::PUT, &path, request).await?;
        Ok(result.rev)
    }

    /// Download an attachment. The returned attachment streams its content
    /// from the response body.
    pub async fn get_attachment(&self, id: &str, name: &str, opts: QueryOptions) -> Result<Attachment> {
        let path = self.attachment_path(id, name)?;
        let request = RequestOptions {
            accept: Some("*/*".to_string()),
            query: options_to_params(&opts)?,
            ..Default::default()
        };
        let response = self.client.do_error(Method::GET, &path, request).await?;
        let meta = attachment_meta(&response);
        let content = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let attachment = Attachment::from_stream(meta.content_type, content);
        Ok(match meta.size {
            Some(size) => attachment.with_size(size),
            None => attachment,
        })
    }

    /// Attachment metadata, without its content.
    pub async fn get_attachment_meta(&self, id: &str, name: &str, opts: QueryOptions) -> Result<AttachmentMeta> {
        let path = self.attachment_path(id, name)?;
        let request = RequestOptions {
            accept: Some("*/*".to_string()),
            query: options_to_params(&opts)?,
            ..Default::default()
        };
        let response = self.client.do_error(Method::HEAD, &path, request).await?;
        Ok(attachment_meta(&response))
    }

    /// Delete an attachment, returning the document's new revision.
    pub async fn delete_attachment(
        &self,
        id: &str,
        rev: &str,
        name: &str,
        mut opts: QueryOptions,
    ) -> Result<String> {
        let path = self.attachment_path(id, name)?;
        if rev.is_empty() {
            return Err(CouchError::missing_arg("rev"));
        }
        let full_commit = take_full_commit(&mut opts, false)?;
        let mut query = options_to_params(&opts)?;
        query.push(("rev".to_string(), rev.to_string()));
        let request = RequestOptions::default()
            .with_full_commit(full_commit)
            .with_query(query);
        let response = self.client.do_error(Method::DELETE, &path, request).await?;
        let result: DocResult = decode_json(response).await?;
        Ok(result.rev)
    }
}

fn header_u64(response: &reqwest::Response, name: http::HeaderName) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn attachment_meta(response: &reqwest::Response) -> AttachmentMeta {
    let headers = response.headers();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(media_types::OCTET_STREAM)
        .to_string();
    let digest = headers
        .get("content-md5")
        .and_then(|value| value.to_str().ok())
        .map(|md5| format!("md5-{}", md5))
        .or_else(|| super::transport::etag(response));
    AttachmentMeta {
        content_type,
        size: header_u64(response, CONTENT_LENGTH),
        digest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusKind;
    use crate::types::Document;
    use bytes::Bytes;
    use mockito::Matcher;
    use serde_json::json;

    async fn setup() -> (mockito::ServerGuard, Database) {
        let server = mockito::Server::new_async().await;
        let client = CouchClient::connect(&server.url()).await.unwrap();
        let db = client.db("db").unwrap();
        (server, db)
    }

    fn opts(value: Value) -> QueryOptions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_db_name_validation() {
        assert!(validate_db_name("photos").is_ok());
        assert!(validate_db_name("a/b_c$d(e)f+g-h").is_ok());
        assert!(validate_db_name("_users").is_ok());
        assert!(validate_db_name("Photos").is_err());
        assert!(validate_db_name("1abc").is_err());
        assert!(validate_db_name("_other").is_err());
        let err = validate_db_name("").unwrap_err();
        assert_eq!(err.to_string(), "bad API call: dbName required");
    }

    #[test]
    fn test_stats_merge() {
        let body: StatsBody = serde_json::from_value(json!({
            "db_name": "db",
            "doc_count": 3,
            "doc_del_count": 1,
            "update_seq": "5-g1AAAA",
            "disk_size": 10,
            "data_size": 5,
            "sizes": {"file": 100, "external": 40, "active": 50}
        }))
        .unwrap();
        let stats = body.into_stats();
        assert_eq!(stats.name, "db");
        assert_eq!(stats.doc_count, 3);
        assert_eq!(stats.deleted_count, 1);
        assert_eq!(stats.update_seq, "5-g1AAAA");
        assert_eq!(stats.disk_size, 100);
        assert_eq!(stats.external_size, 40);
        assert_eq!(stats.active_size, 50);

        let legacy: StatsBody = serde_json::from_value(json!({
            "db_name": "db", "update_seq": 12, "disk_size": 10, "data_size": 5
        }))
        .unwrap();
        let stats = legacy.into_stats();
        assert_eq!(stats.update_seq, "12");
        assert_eq!(stats.disk_size, 10);
        assert_eq!(stats.active_size, 5);
    }

    #[tokio::test]
    async fn test_put_plain_json() {
        let (mut server, db) = setup().await;
        let m = server
            .mock("PUT", "/db/doc1")
            .match_header("content-type", "application/json")
            .match_header("x-couch-full-commit", "true")
            .match_body(Matcher::Json(json!({"_id": "doc1", "n": 1})))
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"1-abc"}"#)
            .create_async()
            .await;

        let rev = db
            .put(
                "doc1",
                json!({"_id": "doc1", "n": 1}),
                opts(json!({"X-Couch-Full-Commit": true})),
            )
            .await
            .unwrap();
        assert_eq!(rev, "1-abc");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_put_multipart() {
        let (mut server, db) = setup().await;
        let m = server
            .mock("PUT", "/db/doc1")
            .match_header(
                "content-type",
                Matcher::Regex(r#"^multipart/related; boundary="[0-9a-f]{32}"$"#.into()),
            )
            .match_body(Matcher::Regex(
                r#"(?s)^--[0-9a-f]{32}\r\nContent-Type: application/json\r\n\r\n\{"_id":"doc1","_attachments":\{"a.txt":\{"content_type":"text/plain","follows":true\}\}\}\r\n--[0-9a-f]{32}\r\nContent-Type: text/plain\r\nContent-Disposition: attachment; filename="a.txt"\r\n\r\nhi\r\n--[0-9a-f]{32}--\r\n$"#.into(),
            ))
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"1-abc"}"#)
            .create_async()
            .await;

        let mut doc = Document::new()
            .with_field("_id", json!("doc1"))
            .with_attachment("a.txt", Attachment::from_bytes("text/plain", "hi"));
        let rev = db.put("doc1", &mut doc, QueryOptions::new()).await.unwrap();
        assert_eq!(rev, "1-abc");
        assert!(doc.attachments().unwrap().is_empty());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_put_attachment_failure_surfaces_encode_error() {
        let (mut server, db) = setup().await;
        let _m = server
            .mock("PUT", "/db/doc1")
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"1-abc"}"#)
            .create_async()
            .await;

        let failing = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "disk gone")),
        ]);
        let doc = Document::new()
            .with_field("_id", json!("doc1"))
            .with_attachment("a.txt", Attachment::from_stream("text/plain", failing));
        let err = db.put("doc1", doc, QueryOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusKind::NetworkError);
        assert!(
            matches!(&err, CouchError::Encode(EncodeError::AttachmentRead { name, .. }) if name == "a.txt"),
            "unexpected error: {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_put_id_mismatch() {
        let (mut server, db) = setup().await;
        let _m = server
            .mock("PUT", "/db/doc1")
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"other","rev":"1-abc"}"#)
            .create_async()
            .await;
        let err = db.put("doc1", json!({}), QueryOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusKind::BadResponse);
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let (_server, db) = setup().await;
        let err = db.put("", json!({}), QueryOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusKind::BadApiCall);
        assert!(db.get("", QueryOptions::new()).await.is_err());
        assert!(db.delete("x", "", QueryOptions::new()).await.is_err());
        assert!(db.copy("", "src", QueryOptions::new()).await.is_err());
        assert!(db.compact_view("").await.is_err());
        assert!(db.query("", "v", QueryOptions::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_option_rejected_before_request() {
        let (_server, db) = setup().await;
        let err = db
            .all_docs(opts(json!({"limit": {"a": 1}})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusKind::BadApiCall);
    }

    #[tokio::test]
    async fn test_get_document() {
        let (mut server, db) = setup().await;
        let m = server
            .mock("GET", "/db/_design/app")
            .match_query(Matcher::UrlEncoded("revs".into(), "true".into()))
            .match_header("if-none-match", "\"1-old\"")
            .with_header("etag", "\"2-new\"")
            .with_body(r#"{"_id":"_design/app","_rev":"2-new"}"#)
            .create_async()
            .await;

        let doc = db
            .get("_design/app", opts(json!({"revs": true, "If-None-Match": "1-old"})))
            .await
            .unwrap();
        assert_eq!(doc.rev, "2-new");
        assert_eq!(doc.json::<Value>().unwrap()["_rev"], "2-new");
        assert_eq!(doc.content_length, Some(doc.body.len() as u64));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_meta_and_not_found() {
        let (mut server, db) = setup().await;
        let _found = server
            .mock("HEAD", "/db/doc1")
            .with_header("etag", "\"3-abc\"")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/db/nope")
            .with_status(404)
            .with_body(r#"{"error":"not_found","reason":"missing"}"#)
            .create_async()
            .await;

        let (_size, rev) = db.get_meta("doc1", QueryOptions::new()).await.unwrap();
        assert_eq!(rev, "3-abc");

        let err = db.get("nope", QueryOptions::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_copy() {
        let (mut server, db) = setup().await;
        let del = server
            .mock("DELETE", "/db/a%2Fb")
            .match_query(Matcher::UrlEncoded("rev".into(), "1-abc".into()))
            .with_header("etag", "\"2-del\"")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;
        let copy = server
            .mock("COPY", "/db/src")
            .match_header("destination", "dst")
            .with_status(201)
            .with_header("etag", "\"1-copy\"")
            .create_async()
            .await;

        assert_eq!(db.delete("a/b", "1-abc", QueryOptions::new()).await.unwrap(), "2-del");
        assert_eq!(db.copy("dst", "src", QueryOptions::new()).await.unwrap(), "1-copy");
        del.assert_async().await;
        copy.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_doc_and_query() {
        let (mut server, db) = setup().await;
        let _post = server
            .mock("POST", "/db")
            .match_query(Matcher::UrlEncoded("batch".into(), "ok".into()))
            .with_status(202)
            .with_body(r#"{"ok":true,"id":"generated","rev":"1-x"}"#)
            .create_async()
            .await;
        let view = server
            .mock("GET", "/db/_design/app/_view/by_name")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("include_docs".into(), "true".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_body(r#"{"total_rows":1,"offset":0,"rows":[{"id":"a","key":"a","value":1}]}"#)
            .create_async()
            .await;

        let (id, rev) = db
            .create_doc(&json!({"n": 1}), opts(json!({"batch": "ok"})))
            .await
            .unwrap();
        assert_eq!((id.as_str(), rev.as_str()), ("generated", "1-x"));

        let rows = db
            .query("_design/app", "by_name", opts(json!({"include_docs": true, "limit": 2})))
            .await
            .unwrap();
        assert_eq!(rows.rows.len(), 1);
        view.assert_async().await;
    }

    #[tokio::test]
    async fn test_admin_commands() {
        let (mut server, db) = setup().await;
        let mocks = vec![
            server.mock("POST", "/db/_ensure_full_commit").with_status(201).create_async().await,
            server.mock("POST", "/db/_compact").with_status(202).create_async().await,
            server.mock("POST", "/db/_compact/app").with_status(202).create_async().await,
            server.mock("POST", "/db/_view_cleanup").with_status(202).create_async().await,
        ];
        db.flush().await.unwrap();
        db.compact().await.unwrap();
        db.compact_view("app").await.unwrap();
        db.view_cleanup().await.unwrap();
        for m in mocks {
            m.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_security_round_trip() {
        let (mut server, db) = setup().await;
        let _get = server
            .mock("GET", "/db/_security")
            .with_body(r#"{"admins":{"names":["bob"]},"members":{"roles":["staff"]}}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/db/_security")
            .match_body(Matcher::Json(json!({"admins":{"names":["bob"]},"members":{"roles":["staff"]}})))
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let sec = db.security().await.unwrap();
        assert_eq!(sec.admins.names, vec!["bob"]);
        db.set_security(&sec).await.unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_attachment_operations() {
        let (mut server, db) = setup().await;
        let put = server
            .mock("PUT", "/db/doc1/a.txt")
            .match_query(Matcher::UrlEncoded("rev".into(), "1-abc".into()))
            .match_header("content-type", "text/plain")
            .match_header("content-length", "5")
            .match_body("hello")
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"2-def"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/db/doc1/a.txt")
            .with_header("content-type", "text/plain")
            .with_header("content-md5", "XUFAKrxLKna5cZ2REBfFkg==")
            .with_body("hello")
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/db/doc1/a.txt")
            .with_header("content-type", "text/plain")
            .with_header("etag", "\"md5-XUFAKrxLKna5cZ2REBfFkg==\"")
            .create_async()
            .await;
        let _del = server
            .mock("DELETE", "/db/doc1/a.txt")
            .match_query(Matcher::UrlEncoded("rev".into(), "2-def".into()))
            .with_body(r#"{"ok":true,"id":"doc1","rev":"3-ghi"}"#)
            .create_async()
            .await;

        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ]);
        let rev = db
            .put_attachment(
                "doc1",
                "1-abc",
                "a.txt",
                Attachment::from_stream("text/plain", chunks),
                QueryOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(rev, "2-def");
        put.assert_async().await;

        let mut fetched = db.get_attachment("doc1", "a.txt", QueryOptions::new()).await.unwrap();
        assert_eq!(fetched.content_type, "text/plain");
        let mut content = fetched.take_content().unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = content.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"hello");

        let meta = db.get_attachment_meta("doc1", "a.txt", QueryOptions::new()).await.unwrap();
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.digest.as_deref(), Some("md5-XUFAKrxLKna5cZ2REBfFkg=="));

        let rev = db
            .delete_attachment("doc1", "2-def", "a.txt", QueryOptions::new())
            .await
            .unwrap();
        assert_eq!(rev, "3-ghi");
    }

    #[tokio::test]
    async fn test_server_level_operations() {
        let mut server = mockito::Server::new_async().await;
        let _all = server
            .mock("GET", "/_all_dbs")
            .with_body(r#"["_users","db"]"#)
            .create_async()
            .await;
        let _exists = server.mock("HEAD", "/db").create_async().await;
        let _missing = server.mock("HEAD", "/nope").with_status(404).create_async().await;
        let create = server
            .mock("PUT", "/newdb")
            .match_query(Matcher::UrlEncoded("q".into(), "8".into()))
            .with_status(201)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;
        let destroy = server
            .mock("DELETE", "/newdb")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = CouchClient::connect(&server.url()).await.unwrap();
        assert_eq!(client.all_dbs().await.unwrap(), vec!["_users", "db"]);
        assert!(client.db_exists("db").await.unwrap());
        assert!(!client.db_exists("nope").await.unwrap());

        let db = client.create_db("newdb", opts(json!({"q": 8}))).await.unwrap();
        assert_eq!(db.name(), "newdb");
        client.destroy_db("newdb").await.unwrap();
        create.assert_async().await;
        destroy.assert_async().await;

        assert!(client.db("Bad Name").is_err());
    }
}
