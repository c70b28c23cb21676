//! Utility functions for the CouchDB client.
//!
//! This module provides helper functions for:
//! - Classifying transport failures into curl-style exit codes
//! - Recovering upload encoder errors from the transport's error chain
//! - Formatting the User-Agent header
//! - Splitting document IDs into URL path segments

use crate::error::{CouchError, EncodeError, ExitStatus};
use std::error::Error as StdError;

/// Classify a transport failure into a curl exit code.
///
/// Timeouts, redirect loops, DNS failures and refused connections have their
/// own codes; everything else is [`ExitStatus::UnknownFailure`].
pub fn classify_transport_error(err: &reqwest::Error) -> ExitStatus {
    if err.is_timeout() {
        return ExitStatus::OperationTimeout;
    }
    if err.is_redirect() {
        return ExitStatus::TooManyRedirects;
    }
    if chain_mentions(err, "dns error") {
        return ExitStatus::HostNotResolved;
    }
    if has_io_kind(err, std::io::ErrorKind::ConnectionRefused) || err.is_connect() {
        return ExitStatus::FailedToConnect;
    }
    ExitStatus::UnknownFailure
}

/// Find an [`EncodeError`] anywhere in an error's source chain.
///
/// A failing upload body reaches the caller wrapped by the HTTP stack. This
/// digs the original encoder failure back out.
pub fn find_encode_error(err: &(dyn StdError + 'static)) -> Option<EncodeError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<EncodeError>() {
            return Some(found.clone());
        }
        current = e.source();
    }
    None
}

/// Convert a transport failure into a driver error.
pub(crate) fn transport_error(err: reqwest::Error) -> CouchError {
    if let Some(encode) = find_encode_error(&err) {
        return CouchError::Encode(encode);
    }
    CouchError::Network {
        exit: classify_transport_error(&err),
        message: err.to_string(),
    }
}

/// Format the User-Agent header value.
///
/// ```
/// use couchdb_stream_http::client::format_user_agent;
///
/// let ua = format_user_agent("couchdb-stream-http", "1.0.0");
/// assert!(ua.starts_with("couchdb-stream-http/1.0.0 (Language=Rust; Platform="));
/// ```
pub fn format_user_agent(product: &str, version: &str) -> String {
    format!(
        "{}/{} (Language=Rust; Platform={}/{})",
        product,
        version,
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}

/// Split a document ID into URL path segments.
///
/// Design and local document IDs keep their prefix as a separate segment so
/// the slash is not percent-encoded; any other ID is a single segment.
///
/// ```
/// use couchdb_stream_http::client::doc_id_segments;
///
/// assert_eq!(doc_id_segments("_design/app"), vec!["_design", "app"]);
/// assert_eq!(doc_id_segments("a/b"), vec!["a/b"]);
/// ```
pub fn doc_id_segments(id: &str) -> Vec<&str> {
    for prefix in ["_design/", "_local/"] {
        if let Some(rest) = id.strip_prefix(prefix) {
            return vec![&prefix[..prefix.len() - 1], rest];
        }
    }
    vec![id]
}

fn chain_mentions(err: &(dyn StdError + 'static), needle: &str) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().contains(needle) {
            return true;
        }
        current = e.source();
    }
    false
}

fn has_io_kind(err: &(dyn StdError + 'static), kind: std::io::ErrorKind) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == kind {
                return true;
            }
        }
        current = e.source();
    }
    false
}
