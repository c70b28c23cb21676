//! Header parsing and formatting for CouchDB requests and multipart parts.
//!
//! # Header Formats
//!
//! | Header | Format | Example |
//! |--------|--------|---------|
//! | ETag / If-None-Match | Quoted revision | `"1-967a00dff5e02add41819138abb3284d"` |
//! | Content-Type (upload) | `multipart/related; boundary="..."` | `multipart/related; boundary="abc"` |
//! | Content-Disposition | `attachment; filename="..."` | `attachment; filename="a.txt"` |
//! | Set-Cookie | `name=value; attrs` | `AuthSession=abc; Path=/` |
//!
//! # Examples
//!
//! ```
//! use couchdb_stream_http::protocol::{
//!     quote_etag, unquote_etag, format_content_disposition, multipart_content_type,
//! };
//!
//! assert_eq!(quote_etag("1-abc"), r#""1-abc""#);
//! assert_eq!(unquote_etag(r#""1-abc""#), "1-abc");
//! assert_eq!(format_content_disposition("a.txt"), r#"attachment; filename="a.txt""#);
//! assert_eq!(
//!     multipart_content_type("xyz"),
//!     r#"multipart/related; boundary="xyz""#
//! );
//! ```

use super::constants::media_types;

/// Quote an ETag value, stripping any quotes already present.
///
/// ```
/// use couchdb_stream_http::protocol::quote_etag;
///
/// assert_eq!(quote_etag("1-abc"), r#""1-abc""#);
/// assert_eq!(quote_etag(r#""1-abc""#), r#""1-abc""#);
/// ```
pub fn quote_etag(value: &str) -> String {
    format!("\"{}\"", value.trim_matches('"'))
}

/// Strip surrounding quotes from an ETag value.
#[inline]
pub fn unquote_etag(value: &str) -> &str {
    value.trim_matches('"')
}

/// Format the `Content-Type` header value for a multipart upload.
#[inline]
pub fn multipart_content_type(boundary: &str) -> String {
    format!(
        "{}; boundary=\"{}\"",
        media_types::MULTIPART_RELATED,
        boundary
    )
}

/// Format a `Content-Disposition` header naming an attachment.
///
/// The filename is quoted. Quotes, backslashes and control characters are
/// escaped so the header always stays on one line.
///
/// ```
/// use couchdb_stream_http::protocol::format_content_disposition;
///
/// assert_eq!(
///     format_content_disposition("say \"hi\".txt"),
///     r#"attachment; filename="say \"hi\".txt""#
/// );
/// assert_eq!(
///     format_content_disposition("two\nlines"),
///     r#"attachment; filename="two\nlines""#
/// );
/// ```
pub fn format_content_disposition(filename: &str) -> String {
    format!("attachment; filename={}", quote_header_string(filename))
}

fn quote_header_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:04x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Check that a value can be written as a header without breaking framing.
///
/// Rejects empty values and any control character other than horizontal tab.
pub fn is_valid_header_value(value: &str) -> bool {
    !value.trim().is_empty() && !value.chars().any(|c| c.is_control() && c != '\t')
}

/// Extract a cookie's `name=value` pair from a `Set-Cookie` header value.
///
/// Returns `None` if the header sets a different cookie.
///
/// ```
/// use couchdb_stream_http::protocol::parse_set_cookie;
///
/// let header = "AuthSession=YWRtaW46NUI; Version=1; Path=/; HttpOnly";
/// assert_eq!(
///     parse_set_cookie(header, "AuthSession").as_deref(),
///     Some("AuthSession=YWRtaW46NUI")
/// );
/// assert!(parse_set_cookie(header, "Other").is_none());
/// ```
pub fn parse_set_cookie(value: &str, name: &str) -> Option<String> {
    let pair = value.split(';').next()?.trim();
    let (key, cookie_value) = pair.split_once('=')?;
    if key.trim() != name || cookie_value.is_empty() {
        return None;
    }
    Some(format!("{}={}", name, cookie_value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_etag() {
        assert_eq!(quote_etag("2-def"), "\"2-def\"");
        assert_eq!(quote_etag("\"2-def\""), "\"2-def\"");
    }

    #[test]
    fn test_unquote_etag() {
        assert_eq!(unquote_etag("\"2-def\""), "2-def");
        assert_eq!(unquote_etag("2-def"), "2-def");
    }

    #[test]
    fn test_content_disposition_escapes() {
        assert_eq!(
            format_content_disposition("a\\b.txt"),
            r#"attachment; filename="a\\b.txt""#
        );
        assert_eq!(
            format_content_disposition("bell\u{7}"),
            r#"attachment; filename="bell\u{0007}""#
        );
    }

    #[test]
    fn test_valid_header_value() {
        assert!(is_valid_header_value("text/plain; charset=utf-8"));
        assert!(!is_valid_header_value("text/plain\r\nX-Evil: 1"));
        assert!(!is_valid_header_value(""));
        assert!(!is_valid_header_value("   "));
    }

    #[test]
    fn test_parse_set_cookie_empty_value() {
        assert!(parse_set_cookie("AuthSession=; Path=/", "AuthSession").is_none());
    }

    #[test]
    fn test_multipart_content_type() {
        assert_eq!(
            multipart_content_type("b1"),
            "multipart/related; boundary=\"b1\""
        );
    }
}
