//! Multipart/related framing of a document and its attachments.
//!
//! The body is written part by part into a [`PipeWriter`]:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Type: application/json\r\n
//! \r\n
//! <document JSON, _attachments replaced by stubs>
//! \r\n--<boundary>\r\n
//! Content-Type: <type>\r\n
//! Content-Disposition: attachment; filename="<name>"\r\n
//! \r\n
//! <attachment bytes>
//! \r\n--<boundary>--\r\n
//! ```

use super::pipe::PipeWriter;
use super::rewrite::{rewrite_with, JsonRewriter};
use crate::error::EncodeError;
use crate::protocol::constants::{media_types, ATTACHMENTS_KEY};
use crate::protocol::headers::{format_content_disposition, is_valid_header_value};
use crate::types::{Attachment, Attachments};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};

// Part headers are written in canonical case.
const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_DISPOSITION: &str = "Content-Disposition";

/// Incremental writer of multipart framing around caller-supplied content.
struct PartWriter<'a> {
    writer: &'a mut PipeWriter,
    boundary: &'a str,
    parts: usize,
}

impl<'a> PartWriter<'a> {
    fn new(writer: &'a mut PipeWriter, boundary: &'a str) -> Self {
        PartWriter {
            writer,
            boundary,
            parts: 0,
        }
    }

    /// Write the delimiter and headers that open a new part.
    async fn open_part(&mut self, headers: &[(&str, &str)]) -> Result<(), EncodeError> {
        let mut buf = BytesMut::with_capacity(128);
        if self.parts > 0 {
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"\r\n");
        for (name, value) in headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        self.parts += 1;
        self.writer.write(buf.freeze()).await
    }

    async fn close(self) -> Result<(), EncodeError> {
        let mut buf = BytesMut::with_capacity(self.boundary.len() + 8);
        buf.put_slice(b"\r\n--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");
        self.writer.write(buf.freeze()).await
    }
}

/// Write the full multipart body for `document` and `attachments`.
///
/// `document` is the serialized document. Its `_attachments` value is
/// replaced by the stub map of `attachments`, and added when absent if there
/// is at least one attachment. Attachment content is streamed chunk by chunk
/// and each stream is dropped as soon as it is exhausted. On any error the
/// remaining streams are dropped along with `attachments` before returning.
pub(crate) async fn assemble<S>(
    writer: &mut PipeWriter,
    boundary: &str,
    document: S,
    attachments: Attachments,
) -> Result<(), EncodeError>
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    let rewriter = JsonRewriter::new(ATTACHMENTS_KEY, &attachments.stubs())?
        .insert_missing(!attachments.is_empty());

    let mut parts = PartWriter::new(writer, boundary);
    parts
        .open_part(&[(CONTENT_TYPE, media_types::JSON)])
        .await?;

    let mut doc_part = rewrite_with(document, rewriter);
    while let Some(chunk) = doc_part.next().await {
        parts.writer.write(chunk?).await?;
    }
    drop(doc_part);

    for (name, attachment) in attachments {
        write_attachment(&mut parts, &name, attachment).await?;
    }

    parts.close().await
}

async fn write_attachment(
    parts: &mut PartWriter<'_>,
    name: &str,
    mut attachment: Attachment,
) -> Result<(), EncodeError> {
    if !is_valid_header_value(&attachment.content_type) {
        return Err(EncodeError::InvalidContentType {
            name: name.to_string(),
            content_type: attachment.content_type,
        });
    }
    let mut content = attachment
        .take_content()
        .ok_or_else(|| EncodeError::AttachmentConsumed(name.to_string()))?;

    let disposition = format_content_disposition(name);
    parts
        .open_part(&[
            (CONTENT_TYPE, attachment.content_type.as_str()),
            (CONTENT_DISPOSITION, disposition.as_str()),
        ])
        .await?;

    while let Some(chunk) = content.next().await {
        let chunk = chunk.map_err(|err| EncodeError::attachment_read(name, err))?;
        parts.writer.write(chunk).await?;
    }
    tracing::debug!("attachment '{}' written", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::pipe::pipe;
    use futures::stream;
    use serde_json::json;

    fn doc_stream(json: &'static str) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        stream::iter(vec![Ok(Bytes::from_static(json.as_bytes()))])
    }

    async fn collect(reader: crate::multipart::PipeReader) -> Result<String, EncodeError> {
        let chunks: Vec<Result<Bytes, EncodeError>> = reader.collect().await;
        let mut body = Vec::new();
        for chunk in chunks {
            body.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8(body).unwrap())
    }

    #[tokio::test]
    async fn test_header_casing_and_order() {
        let atts = Attachments::new().with("a.txt", Attachment::from_bytes("text/plain", "hi"));
        let reader = pipe(4, |mut w| async move {
            assemble(&mut w, "B", doc_stream(r#"{"_id":"x"}"#), atts).await
        });
        let body = collect(reader).await.unwrap();
        assert!(body.contains(
            "\r\n--B\r\nContent-Type: text/plain\r\nContent-Disposition: attachment; filename=\"a.txt\"\r\n\r\nhi"
        ));
        assert!(body.starts_with("--B\r\nContent-Type: application/json\r\n\r\n"));
        assert!(body.ends_with("\r\n--B--\r\n"));
    }

    #[tokio::test]
    async fn test_no_attachments_keeps_document() {
        let reader = pipe(4, |mut w| async move {
            assemble(&mut w, "B", doc_stream(r#"{"_id":"x","n":1.50}"#), Attachments::new()).await
        });
        let body = collect(reader).await.unwrap();
        assert_eq!(
            body,
            "--B\r\nContent-Type: application/json\r\n\r\n{\"_id\":\"x\",\"n\":1.50}\r\n--B--\r\n"
        );
    }

    #[tokio::test]
    async fn test_stubs_inserted_when_key_missing() {
        let atts = Attachments::new().with("a.txt", Attachment::from_bytes("text/plain", "hi"));
        let reader = pipe(4, |mut w| async move {
            assemble(&mut w, "B", doc_stream(r#"{"_id":"x"}"#), atts).await
        });
        let body = collect(reader).await.unwrap();
        let doc_part = body
            .split("\r\n\r\n")
            .nth(1)
            .and_then(|rest| rest.split("\r\n--B").next())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(doc_part).unwrap();
        assert_eq!(
            parsed,
            json!({"_id": "x", "_attachments": {"a.txt": {"content_type": "text/plain", "follows": true}}})
        );
    }

    #[tokio::test]
    async fn test_invalid_content_type_rejected() {
        let atts = Attachments::new().with("a.txt", Attachment::from_bytes("text/plain\r\nX-Evil: 1", "hi"));
        let reader = pipe(4, |mut w| async move {
            assemble(&mut w, "B", doc_stream(r#"{}"#), atts).await
        });
        let err = collect(reader).await.unwrap_err();
        assert!(matches!(err, EncodeError::InvalidContentType { ref name, .. } if name == "a.txt"));
    }

    #[tokio::test]
    async fn test_consumed_attachment_rejected() {
        let mut att = Attachment::from_bytes("text/plain", "hi");
        drop(att.take_content());
        let atts = Attachments::new().with("a.txt", att);
        let reader = pipe(4, |mut w| async move {
            assemble(&mut w, "B", doc_stream(r#"{}"#), atts).await
        });
        assert!(matches!(
            collect(reader).await,
            Err(EncodeError::AttachmentConsumed(name)) if name == "a.txt"
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_fails_before_attachments() {
        let atts = Attachments::new().with("a.txt", Attachment::from_bytes("text/plain", "hi"));
        let reader = pipe(4, |mut w| async move {
            assemble(&mut w, "B", doc_stream("[1,2]"), atts).await
        });
        let items: Vec<_> = reader.collect().await;
        let last = items.last().unwrap();
        assert!(matches!(last, Err(EncodeError::MalformedInput(_))));
        let text: Vec<u8> = items
            .iter()
            .filter_map(|i| i.as_ref().ok())
            .flat_map(|b| b.to_vec())
            .collect();
        assert!(!String::from_utf8(text).unwrap().contains("a.txt"));
    }
}
