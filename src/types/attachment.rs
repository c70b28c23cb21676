//! Attachments: named binary payloads uploaded alongside a document.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A single-use stream of attachment bytes.
pub type ContentStream = BoxStream<'static, std::io::Result<Bytes>>;

/// A named binary payload associated with a document.
///
/// The content stream is consumed at most once. Taking it with
/// [`Attachment::take_content`] transfers ownership to the caller, and dropping
/// the stream closes it.
pub struct Attachment {
    /// MIME type sent as the part's `Content-Type`
    pub content_type: String,
    /// Size in bytes, if known
    pub size: Option<u64>,
    content: Option<ContentStream>,
}

impl Attachment {
    /// Create an attachment from a byte stream of unknown length.
    pub fn new(content_type: impl Into<String>, content: ContentStream) -> Self {
        Attachment {
            content_type: content_type.into(),
            size: None,
            content: Some(content),
        }
    }

    /// Create an attachment from bytes already in memory.
    pub fn from_bytes(content_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Attachment {
            content_type: content_type.into(),
            size: Some(content.len() as u64),
            content: Some(stream::once(async move { Ok::<_, std::io::Error>(content) }).boxed()),
        }
    }

    /// Create an attachment from any stream of byte chunks.
    pub fn from_stream<S>(content_type: impl Into<String>, content: S) -> Self
    where
        S: futures::Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::new(content_type, content.boxed())
    }

    /// Set a known size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Take the content stream, leaving the attachment consumed.
    pub fn take_content(&mut self) -> Option<ContentStream> {
        self.content.take()
    }

    /// Whether the content stream has already been taken.
    pub fn is_consumed(&self) -> bool {
        self.content.is_none()
    }

    /// The stub written into the document part in place of this attachment.
    pub fn stub(&self) -> AttachmentStub {
        AttachmentStub::follows(&self.content_type)
    }

    /// Fill in `size` by reading the content once, if it is not already set.
    ///
    /// The content is buffered in memory and replaced by a stream over the
    /// buffer, so the attachment can still be uploaded afterwards.
    pub async fn ensure_size(&mut self) -> std::io::Result<u64> {
        if let Some(size) = self.size.filter(|s| *s > 0) {
            return Ok(size);
        }
        let mut content = self.content.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "attachment content already consumed")
        })?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = content.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        drop(content);

        let buffer = buffer.freeze();
        let size = buffer.len() as u64;
        self.size = Some(size);
        self.content = Some(stream::once(async move { Ok::<_, std::io::Error>(buffer) }).boxed());
        Ok(size)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// JSON placeholder for an attachment whose bytes follow in a later part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentStub {
    /// MIME type of the attachment
    pub content_type: String,
    /// Always `true` for uploads: the payload appears later in the body
    pub follows: bool,
}

impl AttachmentStub {
    /// Stub announcing that the payload follows in the same multipart body.
    pub fn follows(content_type: impl Into<String>) -> Self {
        AttachmentStub {
            content_type: content_type.into(),
            follows: true,
        }
    }
}

/// Attachments keyed by name.
///
/// Iteration is ordered by name, which fixes the part order of an upload.
/// Serializes as the stub map (`name -> {content_type, follows}`), never as
/// content.
#[derive(Debug, Default)]
pub struct Attachments {
    entries: BTreeMap<String, Attachment>,
}

impl Attachments {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attachment, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, attachment: Attachment) -> Option<Attachment> {
        self.entries.insert(name.into(), attachment)
    }

    /// Builder-style [`Attachments::insert`].
    pub fn with(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.insert(name, attachment);
        self
    }

    /// Look up an attachment by name.
    pub fn get(&self, name: &str) -> Option<&Attachment> {
        self.entries.get(name)
    }

    /// Remove an attachment by name.
    pub fn remove(&mut self, name: &str) -> Option<Attachment> {
        self.entries.remove(name)
    }

    /// Number of attachments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attachment names in upload order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate in upload order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attachment)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stub map for the document part.
    pub fn stubs(&self) -> BTreeMap<String, AttachmentStub> {
        self.entries
            .iter()
            .map(|(name, att)| (name.clone(), att.stub()))
            .collect()
    }
}

impl IntoIterator for Attachments {
    type Item = (String, Attachment);
    type IntoIter = std::collections::btree_map::IntoIter<String, Attachment>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Attachment)> for Attachments {
    fn from_iter<I: IntoIterator<Item = (String, Attachment)>>(iter: I) -> Self {
        Attachments {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Attachments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.stubs().serialize(serializer)
    }
}
