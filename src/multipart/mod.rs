//! Streaming `multipart/related` encoder for document uploads.
//!
//! CouchDB accepts a document together with its attachments as one
//! `multipart/related` request. This module produces that body without ever
//! holding it in memory.
//!
//! # Module Organization
//!
//! ```text
//! multipart/
//! ├── extract  - Detach attachments from a document
//! ├── rewrite  - Streaming JSON rewriter (replaces `_attachments`)
//! ├── assemble - Part framing of the document and attachments
//! └── pipe     - Bounded producer/consumer byte pipe
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MultipartUpload`] | Boundary plus the body stream of one upload |
//! | [`JsonRewriter`] | Incremental single-key JSON rewriter |
//! | [`PipeReader`] | Request body stream fed by the producer task |
//! | [`DetachAttachments`] | Capability to hand over a document's attachments |
//!
//! # Examples
//!
//! ```
//! use couchdb_stream_http::multipart::{document_stream, encode_upload};
//! use couchdb_stream_http::{Attachment, Attachments};
//! use futures::StreamExt;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let doc = document_stream(&json!({"_id": "doc1"})).unwrap();
//! let atts = Attachments::new().with("a.txt", Attachment::from_bytes("text/plain", "hi"));
//!
//! let upload = encode_upload(doc, atts);
//! assert!(upload.content_type().starts_with("multipart/related; boundary=\""));
//!
//! let mut body = Vec::new();
//! let mut stream = upload.into_body();
//! while let Some(chunk) = stream.next().await {
//!     body.extend_from_slice(&chunk.unwrap());
//! }
//! let body = String::from_utf8(body).unwrap();
//! assert!(body.contains(r#"{"_id":"doc1","_attachments":{"a.txt":{"content_type":"text/plain","follows":true}}}"#));
//! assert!(body.contains("\r\n\r\nhi\r\n--"));
//! # });
//! ```

mod assemble;
mod extract;
mod pipe;
mod rewrite;

pub use extract::{extract_attachments, DetachAttachments};
pub use pipe::{pipe, PipeReader, PipeWriter};
pub use rewrite::{rewrite, rewrite_with, JsonRewriter, RewriteState};

use crate::error::EncodeError;
use crate::protocol::headers::multipart_content_type;
use crate::types::Attachments;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;

/// Default number of chunks buffered between the producer and the body.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// One encoded upload: the boundary and the body that uses it.
#[derive(Debug)]
pub struct MultipartUpload {
    boundary: String,
    body: PipeReader,
}

impl MultipartUpload {
    /// Boundary token separating the parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        multipart_content_type(&self.boundary)
    }

    /// The body stream. Dropping it stops the producer and closes every
    /// attachment stream it still owns.
    pub fn into_body(self) -> PipeReader {
        self.body
    }

    /// Split into the `Content-Type` value and the body stream.
    pub fn into_parts(self) -> (String, PipeReader) {
        (self.content_type(), self.body)
    }
}

/// Encode a document stream and its attachments as a multipart body.
///
/// Must be called from within a tokio runtime: assembly runs on a spawned
/// task that writes into the returned body as it is read.
pub fn encode_upload<S>(document: S, attachments: Attachments) -> MultipartUpload
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    encode_upload_with_capacity(document, attachments, DEFAULT_PIPE_CAPACITY)
}

/// [`encode_upload`] with an explicit pipe capacity, in chunks.
pub fn encode_upload_with_capacity<S>(
    document: S,
    attachments: Attachments,
    capacity: usize,
) -> MultipartUpload
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    let boundary = uuid::Uuid::new_v4().simple().to_string();
    let task_boundary = boundary.clone();
    tracing::debug!(
        "encoding multipart upload with {} attachment(s)",
        attachments.len()
    );

    let body = pipe(capacity, move |mut writer| async move {
        assemble::assemble(&mut writer, &task_boundary, document, attachments).await
    });

    MultipartUpload { boundary, body }
}

/// Serialize a document into a single-chunk byte stream.
pub fn document_stream(
    document: &impl Serialize,
) -> Result<BoxStream<'static, std::io::Result<Bytes>>, EncodeError> {
    let json = serde_json::to_vec(document)
        .map_err(|err| EncodeError::MalformedInput(err.to_string()))?;
    Ok(stream::iter([Ok::<_, std::io::Error>(Bytes::from(json))]).boxed())
}
