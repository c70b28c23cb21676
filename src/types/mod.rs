//! Core value types: documents, attachments and driver responses.

mod attachment;
mod document;
mod driver;

pub use attachment::{Attachment, AttachmentStub, Attachments, ContentStream};
pub use document::Document;
pub use driver::{AttachmentMeta, DbStats, DocumentResponse, Members, Row, Rows, Security};
