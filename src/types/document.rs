//! Generic document representation: an ordered JSON object plus attachments.

use super::attachment::{Attachment, Attachments};
use crate::protocol::constants::ATTACHMENTS_KEY;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// A CouchDB document as an ordered key/value mapping.
///
/// Plain fields keep their insertion order when serialized. Attachments are
/// held separately so they can carry byte streams. Once set, the
/// `_attachments` field is always serialized (as stubs, or `{}` after the
/// attachments have been detached).
///
/// ```
/// use couchdb_stream_http::{Attachment, Document};
/// use serde_json::json;
///
/// let doc = Document::new()
///     .with_field("_id", json!("doc1"))
///     .with_field("title", json!("x"))
///     .with_attachment("a.txt", Attachment::from_bytes("text/plain", "hi"));
///
/// assert_eq!(
///     serde_json::to_string(&doc).unwrap(),
///     r#"{"_id":"doc1","title":"x","_attachments":{"a.txt":{"content_type":"text/plain","follows":true}}}"#
/// );
/// ```
#[derive(Debug, Default)]
pub struct Document {
    fields: Map<String, Value>,
    attachments: Option<Attachments>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from existing JSON fields.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Document {
            fields,
            attachments: None,
        }
    }

    /// Set a field, keeping its original position if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Builder-style [`Document::insert`].
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Add an attachment.
    pub fn add_attachment(&mut self, name: impl Into<String>, attachment: Attachment) {
        self.attachments
            .get_or_insert_with(Attachments::default)
            .insert(name, attachment);
    }

    /// Builder-style [`Document::add_attachment`].
    pub fn with_attachment(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.add_attachment(name, attachment);
        self
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Document ID, if set.
    pub fn id(&self) -> Option<&str> {
        self.fields.get("_id").and_then(Value::as_str)
    }

    /// Revision, if set.
    pub fn rev(&self) -> Option<&str> {
        self.fields.get("_rev").and_then(Value::as_str)
    }

    /// JSON fields, in order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Attachments currently held by the document.
    pub fn attachments(&self) -> Option<&Attachments> {
        self.attachments.as_ref()
    }

    pub(crate) fn attachments_mut(&mut self) -> Option<&mut Attachments> {
        self.attachments.as_mut()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let typed = self.attachments.is_some();
        let len = self.fields.len() + usize::from(typed);
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.fields {
            // A typed attachment set wins over a raw JSON `_attachments` field.
            if typed && key == ATTACHMENTS_KEY {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        if let Some(attachments) = &self.attachments {
            map.serialize_entry(ATTACHMENTS_KEY, attachments)?;
        }
        map.end()
    }
}
