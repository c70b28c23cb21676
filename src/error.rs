//! Error types for the CouchDB driver and the multipart encoder.
//!
//! Two layers of errors exist:
//!
//! - [`EncodeError`] is produced by the streaming upload pipeline (JSON rewriting,
//!   multipart assembly, the producer/consumer pipe). It is `Clone` so that a
//!   failure travelling through the HTTP body can be recovered intact from the
//!   transport's error chain.
//! - [`CouchError`] is what every driver operation returns. It wraps
//!   [`EncodeError`] and adds HTTP status failures, transport failures and
//!   argument validation.
//!
//! Every error can be classified into a [`StatusKind`] via [`CouchError::status`].

use std::sync::Arc;
use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, CouchError>;

/// Errors raised while encoding a document upload.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The document byte stream is not a well-formed JSON object.
    #[error("malformed document JSON: {0}")]
    MalformedInput(String),

    /// Reading the document byte stream itself failed.
    #[error("failed to read document stream: {0}")]
    DocumentRead(#[source] Arc<std::io::Error>),

    /// An attachment's content stream failed mid-read.
    #[error("failed to read attachment '{name}': {source}")]
    AttachmentRead {
        /// Attachment name
        name: String,
        /// Underlying read failure
        #[source]
        source: Arc<std::io::Error>,
    },

    /// An attachment's content stream was already consumed.
    #[error("content of attachment '{0}' was already consumed")]
    AttachmentConsumed(String),

    /// An attachment's content type cannot be written as a part header.
    #[error("attachment '{name}' has an invalid content type: {content_type:?}")]
    InvalidContentType {
        /// Attachment name
        name: String,
        /// Offending content type
        content_type: String,
    },

    /// The consumer abandoned the body before the producer finished.
    #[error("upload stream closed by consumer")]
    StreamClosed,

    /// The producer task panicked before finishing the body.
    #[error("upload producer failed: {0}")]
    ProducerFailed(String),
}

impl EncodeError {
    pub(crate) fn document_read(err: std::io::Error) -> Self {
        EncodeError::DocumentRead(Arc::new(err))
    }

    pub(crate) fn attachment_read(name: &str, err: std::io::Error) -> Self {
        EncodeError::AttachmentRead {
            name: name.to_string(),
            source: Arc::new(err),
        }
    }
}

/// Curl-compatible exit codes describing transport failures.
///
/// Carried by [`CouchError::Network`] and [`CouchError::BadApiCall`] so that
/// command line front-ends can exit with the same codes curl would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Unknown failure
    UnknownFailure = 1,
    /// The client could not be initialized
    FailedToInitialize = 2,
    /// The URL was malformed
    UrlMalformed = 3,
    /// DNS resolution failed
    HostNotResolved = 6,
    /// The connection was refused or could not be established
    FailedToConnect = 7,
    /// The request timed out
    OperationTimeout = 28,
    /// The redirect limit was hit
    TooManyRedirects = 47,
}

impl ExitStatus {
    /// Numeric exit code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Coarse classification of a failure, independent of its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 412
    PreconditionFailed,
    /// Any other 4xx/5xx status from the server
    Http(u16),
    /// The request never completed (connect, DNS, timeout, body failure)
    NetworkError,
    /// The server answered with something the driver could not understand
    BadResponse,
    /// The caller supplied invalid arguments
    BadApiCall,
}

impl StatusKind {
    /// Classify an HTTP status code.
    pub fn from_http(status: u16) -> Self {
        match status {
            400 => StatusKind::BadRequest,
            401 => StatusKind::Unauthorized,
            403 => StatusKind::Forbidden,
            404 => StatusKind::NotFound,
            409 => StatusKind::Conflict,
            412 => StatusKind::PreconditionFailed,
            other => StatusKind::Http(other),
        }
    }
}

/// Main error type for driver operations.
#[derive(Debug, Error)]
pub enum CouchError {
    /// The server answered with an error status.
    #[error("{status} {error}: {reason}")]
    Http {
        /// HTTP status code
        status: u16,
        /// CouchDB `error` field (or the canonical status text)
        error: String,
        /// CouchDB `reason` field
        reason: String,
    },

    /// The request could not be completed.
    #[error("network error: {message}")]
    Network {
        /// Curl-style classification of the failure
        exit: ExitStatus,
        /// Description from the transport
        message: String,
    },

    /// The upload body failed while it was being sent.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Invalid arguments or client setup.
    #[error("bad API call: {message}")]
    BadApiCall {
        /// What was wrong
        message: String,
        /// Exit status for initialization failures
        exit: Option<ExitStatus>,
    },

    /// The server response could not be interpreted.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// Authentication setup failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// JSON serialization of a request failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CouchError {
    pub(crate) fn bad_api_call(message: impl Into<String>) -> Self {
        CouchError::BadApiCall {
            message: message.into(),
            exit: None,
        }
    }

    pub(crate) fn missing_arg(arg: &str) -> Self {
        Self::bad_api_call(format!("{} required", arg))
    }

    /// Classify this error.
    pub fn status(&self) -> StatusKind {
        match self {
            CouchError::Http { status, .. } => StatusKind::from_http(*status),
            CouchError::Network { .. } | CouchError::Encode(_) => StatusKind::NetworkError,
            CouchError::BadApiCall { .. } | CouchError::Json(_) => StatusKind::BadApiCall,
            CouchError::BadResponse(_) => StatusKind::BadResponse,
            CouchError::Auth(_) => StatusKind::Unauthorized,
        }
    }

    /// Curl-style exit status, when the failure has one.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self {
            CouchError::Network { exit, .. } => Some(*exit),
            CouchError::BadApiCall { exit, .. } => *exit,
            _ => None,
        }
    }

    /// Check if error is a 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == StatusKind::NotFound
    }

    /// Check if error is a document update conflict.
    pub fn is_conflict(&self) -> bool {
        self.status() == StatusKind::Conflict
    }
}
