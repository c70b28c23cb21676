//! Detaching attachments from documents before upload.
//!
//! A document can carry its attachments in one of two ways:
//!
//! - the generic [`Document`] mapping, which holds them in its typed
//!   `_attachments` slot;
//! - a caller-defined record implementing [`DetachAttachments`] for the field
//!   it serializes as `_attachments`.
//!
//! Detaching moves the entries out and leaves the field empty, so serializing
//! the document afterwards never inlines attachment payloads. Anything else,
//! including a plain JSON `_attachments` value (for example stubs from an
//! earlier fetch), is treated as "no attachments".
//!
//! ```
//! use couchdb_stream_http::{Attachment, Attachments, DetachAttachments};
//! use couchdb_stream_http::multipart::extract_attachments;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Invoice {
//!     #[serde(rename = "_id")]
//!     id: String,
//!     #[serde(rename = "_attachments")]
//!     files: Attachments,
//! }
//!
//! impl DetachAttachments for Invoice {
//!     fn detach_attachments(&mut self) -> Option<Attachments> {
//!         Some(std::mem::take(&mut self.files))
//!     }
//! }
//!
//! let mut invoice = Invoice {
//!     id: "inv-1".into(),
//!     files: Attachments::new().with("scan.pdf", Attachment::from_bytes("application/pdf", "%PDF")),
//! };
//! let files = extract_attachments(&mut invoice).unwrap();
//! assert_eq!(files.len(), 1);
//! assert_eq!(
//!     serde_json::to_string(&invoice).unwrap(),
//!     r#"{"_id":"inv-1","_attachments":{}}"#
//! );
//! ```

use crate::protocol::constants::ATTACHMENTS_KEY;
use crate::types::{Attachments, Document};
use serde_json::{Map, Value};

/// Capability of a document type to hand over its attachments.
///
/// The default implementation reports no attachments, so document types
/// without any need only an empty `impl`.
pub trait DetachAttachments {
    /// Move the attachments out, leaving the document's attachments field
    /// empty. Returns `None` when the document has no attachments field.
    fn detach_attachments(&mut self) -> Option<Attachments> {
        None
    }
}

/// Detach a document's attachments, if it has any.
///
/// Returns `None` and leaves the document untouched when the attachments
/// field is absent, empty, or of a shape that cannot carry content.
pub fn extract_attachments<D>(doc: &mut D) -> Option<Attachments>
where
    D: DetachAttachments + ?Sized,
{
    doc.detach_attachments().filter(|atts| !atts.is_empty())
}

impl DetachAttachments for Document {
    fn detach_attachments(&mut self) -> Option<Attachments> {
        match self.attachments_mut() {
            Some(attachments) => Some(std::mem::take(attachments)),
            None => {
                if self.get(ATTACHMENTS_KEY).is_some() {
                    tracing::debug!("ignoring raw JSON {} field", ATTACHMENTS_KEY);
                }
                None
            }
        }
    }
}

impl DetachAttachments for Map<String, Value> {
    fn detach_attachments(&mut self) -> Option<Attachments> {
        if self.contains_key(ATTACHMENTS_KEY) {
            tracing::debug!("ignoring raw JSON {} field", ATTACHMENTS_KEY);
        }
        None
    }
}

impl DetachAttachments for Value {
    fn detach_attachments(&mut self) -> Option<Attachments> {
        match self {
            Value::Object(map) => map.detach_attachments(),
            _ => None,
        }
    }
}

impl<T: DetachAttachments + ?Sized> DetachAttachments for &mut T {
    fn detach_attachments(&mut self) -> Option<Attachments> {
        (**self).detach_attachments()
    }
}

impl<T: DetachAttachments + ?Sized> DetachAttachments for Box<T> {
    fn detach_attachments(&mut self) -> Option<Attachments> {
        (**self).detach_attachments()
    }
}
