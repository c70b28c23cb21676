//! Protocol constants shared by the transport and the upload encoder.

/// Document field holding attachments.
pub const ATTACHMENTS_KEY: &str = "_attachments";

/// Content types used by the driver.
pub mod media_types {
    /// JSON documents and API responses
    pub const JSON: &str = "application/json";
    /// Multipart document-with-attachments uploads
    pub const MULTIPART_RELATED: &str = "multipart/related";
    /// Fallback for attachments without a declared type
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// CouchDB-specific header names.
pub mod headers {
    use http::HeaderName;

    /// Ask the server to fsync before answering
    pub const FULL_COMMIT: HeaderName = HeaderName::from_static("x-couch-full-commit");
    /// Target document ID for COPY
    pub const DESTINATION: HeaderName = HeaderName::from_static("destination");
}

/// Option keys that become headers instead of query parameters.
pub mod options {
    /// Boolean, sets `X-Couch-Full-Commit: true`
    pub const FULL_COMMIT: &str = "X-Couch-Full-Commit";
    /// String, sets a quoted `If-None-Match` header
    pub const IF_NONE_MATCH: &str = "If-None-Match";
}

/// Name of the cookie CouchDB issues on `POST /_session`.
pub const AUTH_SESSION_COOKIE: &str = "AuthSession";

/// Default product string for the User-Agent header.
pub const USER_AGENT: &str = "couchdb-stream-http";

/// Crate version reported in the User-Agent header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
