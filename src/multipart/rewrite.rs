//! Streaming JSON rewriter that replaces one top-level key's value.
//!
//! Incremental, state-machine based rewriter for a JSON object arriving as a
//! byte stream. The object may be split across chunks at any byte.
//!
//! # Rewriting Flow
//!
//! 1. **ExpectOpen**: skip whitespace, require `{`
//! 2. **ExpectKey / InKey / ExpectColon**: read the next key as raw bytes
//! 3. **ExpectValue / InValue**: copy the value verbatim, or skip it and emit
//!    the replacement when the key is the target
//! 4. **AfterValue**: `,` starts the next key, `}` closes the object
//! 5. **Passthrough**: once the replacement is written, every remaining byte
//!    is forwarded untouched
//!
//! Keys are re-emitted exactly as they appeared and values are copied as raw
//! spans, so numeric and string formatting survive unchanged. Whitespace
//! between tokens before the replacement is dropped.
//!
//! # Examples
//!
//! ```
//! use couchdb_stream_http::multipart::JsonRewriter;
//! use bytes::Bytes;
//! use serde_json::json;
//!
//! let mut rewriter = JsonRewriter::new("_attachments", &json!({"a.txt": {"follows": true}})).unwrap();
//! let mut out = Vec::new();
//! out.extend_from_slice(&rewriter.feed(Bytes::from_static(br#"{"_id":"x", "_attach"#)).unwrap());
//! out.extend_from_slice(&rewriter.feed(Bytes::from_static(br#"ments":{"a.txt":"aGk="}}"#)).unwrap());
//! out.extend_from_slice(&rewriter.finish().unwrap());
//!
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     r#"{"_id":"x","_attachments":{"a.txt":{"follows":true}}}"#
//! );
//! ```

use crate::error::EncodeError;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::de::IgnoredAny;
use serde::Serialize;

/// Position of the rewriter in the input object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteState {
    /// Waiting for the opening brace
    ExpectOpen,
    /// Waiting for a key (or `}` on an empty object)
    ExpectKey,
    /// Inside a key string
    InKey,
    /// Key read, waiting for `:`
    ExpectColon,
    /// Waiting for the first byte of a value
    ExpectValue,
    /// Inside a value
    InValue,
    /// Value read, waiting for `,` or `}`
    AfterValue,
    /// Target replaced; remaining input is forwarded raw
    Passthrough,
    /// Object closed without the target key
    Done,
}

/// Kind of an open container inside a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

/// Next token allowed inside a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrClose,
    Key,
    KeyOrClose,
    Colon,
    CommaOrClose,
}

/// What a scanned byte did to the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scanned {
    /// Part of the value; copy it
    Byte,
    /// Started a scalar, held until the scalar ends
    Held,
    /// Last byte of the value
    Complete,
}

/// Tracks the extent of a raw value and checks its grammar without
/// decoding it.
#[derive(Debug)]
struct ValueScan {
    frames: Vec<Frame>,
    expect: Expect,
    in_string: bool,
    string_is_key: bool,
    escaped: bool,
    /// Hex digits still owed by a `\u` escape
    unicode_left: u8,
    /// Bytes of the current number or literal
    scalar: BytesMut,
}

impl Default for ValueScan {
    fn default() -> Self {
        ValueScan {
            frames: Vec::new(),
            expect: Expect::Value,
            in_string: false,
            string_is_key: false,
            escaped: false,
            unicode_left: 0,
            scalar: BytesMut::new(),
        }
    }
}

impl ValueScan {
    fn reset(&mut self) {
        self.frames.clear();
        self.expect = Expect::Value;
        self.in_string = false;
        self.string_is_key = false;
        self.escaped = false;
        self.unicode_left = 0;
        self.scalar.clear();
    }

    fn string_byte(&mut self, b: u8) -> Result<Scanned, EncodeError> {
        if self.unicode_left > 0 {
            if !b.is_ascii_hexdigit() {
                return Err(malformed("invalid \\u escape in string"));
            }
            self.unicode_left -= 1;
        } else if self.escaped {
            if !b"\"\\/bfnrtu".contains(&b) {
                return Err(malformed("invalid escape sequence in string"));
            }
            if b == b'u' {
                self.unicode_left = 4;
            }
            self.escaped = false;
        } else if b == b'\\' {
            self.escaped = true;
        } else if b == b'"' {
            self.in_string = false;
            if self.string_is_key {
                self.expect = Expect::Colon;
                return Ok(Scanned::Byte);
            }
            return Ok(self.item_done());
        } else if b < 0x20 {
            return Err(malformed("control character in string"));
        }
        Ok(Scanned::Byte)
    }

    /// Validate the held scalar once a byte outside it arrives.
    fn end_scalar(&mut self) -> Result<Scanned, EncodeError> {
        serde_json::from_slice::<IgnoredAny>(&self.scalar).map_err(|_| {
            malformed(&format!(
                "invalid literal '{}'",
                String::from_utf8_lossy(&self.scalar)
            ))
        })?;
        Ok(self.item_done())
    }

    fn token(&mut self, b: u8) -> Result<Scanned, EncodeError> {
        if is_ws(b) {
            return Ok(Scanned::Byte);
        }
        match self.expect {
            Expect::Key | Expect::KeyOrClose => match b {
                b'"' => self.open_string(true),
                b'}' if self.expect == Expect::KeyOrClose => self.close(b),
                _ => Err(unexpected(b, "object key")),
            },
            Expect::Colon => match b {
                b':' => {
                    self.expect = Expect::Value;
                    Ok(Scanned::Byte)
                }
                _ => Err(unexpected(b, "':'")),
            },
            Expect::CommaOrClose => match b {
                b',' => {
                    self.expect = match self.frames.last() {
                        Some(Frame::Object) => Expect::Key,
                        _ => Expect::Value,
                    };
                    Ok(Scanned::Byte)
                }
                b'}' | b']' => self.close(b),
                _ => Err(unexpected(b, "',' or closing bracket")),
            },
            Expect::Value | Expect::ValueOrClose => match b {
                b'"' => self.open_string(false),
                b'{' => {
                    self.frames.push(Frame::Object);
                    self.expect = Expect::KeyOrClose;
                    Ok(Scanned::Byte)
                }
                b'[' => {
                    self.frames.push(Frame::Array);
                    self.expect = Expect::ValueOrClose;
                    Ok(Scanned::Byte)
                }
                b']' if self.expect == Expect::ValueOrClose => self.close(b),
                b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => {
                    self.scalar.put_u8(b);
                    Ok(Scanned::Held)
                }
                _ => Err(unexpected(b, "value")),
            },
        }
    }

    fn open_string(&mut self, is_key: bool) -> Result<Scanned, EncodeError> {
        self.in_string = true;
        self.string_is_key = is_key;
        Ok(Scanned::Byte)
    }

    fn close(&mut self, b: u8) -> Result<Scanned, EncodeError> {
        let closer = match self.frames.pop() {
            Some(Frame::Object) => b'}',
            Some(Frame::Array) => b']',
            None => return Err(unexpected(b, "value")),
        };
        if b != closer {
            return Err(unexpected(b, &format!("'{}'", closer as char)));
        }
        Ok(self.item_done())
    }

    fn item_done(&mut self) -> Scanned {
        if self.frames.is_empty() {
            Scanned::Complete
        } else {
            self.expect = Expect::CommaOrClose;
            Scanned::Byte
        }
    }
}

/// Replaces the value of one top-level key in a streamed JSON object.
#[derive(Debug)]
pub struct JsonRewriter {
    target_key: String,
    replacement: Bytes,
    insert_missing: bool,
    state: RewriteState,
    /// No key emitted yet
    first: bool,
    /// Raw bytes of the current key, quotes included
    key: BytesMut,
    key_escaped: bool,
    /// Current value belongs to the target key
    replacing: bool,
    value: ValueScan,
}

impl JsonRewriter {
    /// Create a rewriter replacing `target_key` with the JSON encoding of
    /// `replacement`.
    pub fn new(
        target_key: impl Into<String>,
        replacement: &impl Serialize,
    ) -> Result<Self, EncodeError> {
        let replacement = serde_json::to_vec(replacement).map_err(|e| {
            EncodeError::MalformedInput(format!("cannot encode replacement value: {}", e))
        })?;
        Ok(JsonRewriter {
            target_key: target_key.into(),
            replacement: Bytes::from(replacement),
            insert_missing: false,
            state: RewriteState::ExpectOpen,
            first: true,
            key: BytesMut::with_capacity(64),
            key_escaped: false,
            replacing: false,
            value: ValueScan::default(),
        })
    }

    /// Append `"target":replacement` before the closing brace when the object
    /// never contained the target key.
    pub fn insert_missing(mut self, insert: bool) -> Self {
        self.insert_missing = insert;
        self
    }

    /// Current state.
    pub fn state(&self) -> RewriteState {
        self.state
    }

    /// Whether the replacement has been written and input is forwarded raw.
    pub fn is_passthrough(&self) -> bool {
        self.state == RewriteState::Passthrough
    }

    /// Feed the next chunk of input, returning the output it produces.
    ///
    /// In passthrough mode the chunk is returned as-is without copying.
    pub fn feed(&mut self, chunk: Bytes) -> Result<Bytes, EncodeError> {
        if self.is_passthrough() {
            return Ok(chunk);
        }

        let mut out = BytesMut::with_capacity(chunk.len() + self.replacement.len());
        let mut i = 0;
        while i < chunk.len() {
            if self.is_passthrough() {
                out.extend_from_slice(&chunk[i..]);
                break;
            }
            if self.step(chunk[i], &mut out)? {
                i += 1;
            }
        }
        Ok(out.freeze())
    }

    /// Signal end of input.
    ///
    /// Fails if the object was never opened or is still open.
    pub fn finish(&mut self) -> Result<Bytes, EncodeError> {
        match self.state {
            RewriteState::Done | RewriteState::Passthrough => Ok(Bytes::new()),
            RewriteState::ExpectOpen => Err(malformed("empty document, expected '{'")),
            _ => Err(malformed("unexpected end of document")),
        }
    }

    /// Process one byte. Returns false when the byte must be processed again
    /// in the new state.
    fn step(&mut self, b: u8, out: &mut BytesMut) -> Result<bool, EncodeError> {
        match self.state {
            RewriteState::ExpectOpen => match b {
                _ if is_ws(b) => {}
                b'{' => {
                    out.put_u8(b'{');
                    self.state = RewriteState::ExpectKey;
                }
                _ => return Err(unexpected(b, "'{'")),
            },
            RewriteState::ExpectKey => match b {
                _ if is_ws(b) => {}
                b'"' => {
                    self.key.clear();
                    self.key.put_u8(b'"');
                    self.key_escaped = false;
                    self.state = RewriteState::InKey;
                }
                b'}' if self.first => self.close_object(out),
                _ => return Err(unexpected(b, "object key")),
            },
            RewriteState::InKey => {
                self.key.put_u8(b);
                if self.key_escaped {
                    self.key_escaped = false;
                } else if b == b'\\' {
                    self.key_escaped = true;
                } else if b == b'"' {
                    self.state = RewriteState::ExpectColon;
                } else if b < 0x20 {
                    return Err(malformed("control character in object key"));
                }
            }
            RewriteState::ExpectColon => match b {
                _ if is_ws(b) => {}
                b':' => {
                    self.begin_value(out)?;
                    self.state = RewriteState::ExpectValue;
                }
                _ => return Err(unexpected(b, "':'")),
            },
            RewriteState::ExpectValue => {
                if is_ws(b) {
                    return Ok(true);
                }
                self.value.reset();
                self.state = RewriteState::InValue;
                return self.step_value(b, out);
            }
            RewriteState::InValue => return self.step_value(b, out),
            RewriteState::AfterValue => match b {
                _ if is_ws(b) => {}
                b',' => self.state = RewriteState::ExpectKey,
                b'}' => self.close_object(out),
                _ => return Err(unexpected(b, "',' or '}'")),
            },
            RewriteState::Done => {
                if !is_ws(b) {
                    return Err(unexpected(b, "end of document"));
                }
            }
            RewriteState::Passthrough => out.put_u8(b),
        }
        Ok(true)
    }

    /// Emit the key and, for the target, the replacement.
    fn begin_value(&mut self, out: &mut BytesMut) -> Result<(), EncodeError> {
        let key: String = serde_json::from_slice(&self.key)
            .map_err(|e| malformed(&format!("invalid object key: {}", e)))?;
        self.replacing = key == self.target_key;

        if !self.first {
            out.put_u8(b',');
        }
        self.first = false;
        out.extend_from_slice(&self.key);
        out.put_u8(b':');
        if self.replacing {
            out.extend_from_slice(&self.replacement);
        }
        Ok(())
    }

    fn step_value(&mut self, b: u8, out: &mut BytesMut) -> Result<bool, EncodeError> {
        let copy = !self.replacing;
        let scan = &mut self.value;

        if scan.in_string {
            let scanned = scan.string_byte(b)?;
            if copy {
                out.put_u8(b);
            }
            if scanned == Scanned::Complete {
                self.end_value();
            }
            return Ok(true);
        }

        if !scan.scalar.is_empty() {
            if is_scalar_byte(b) {
                scan.scalar.put_u8(b);
                return Ok(true);
            }
            let scanned = scan.end_scalar()?;
            if copy {
                out.extend_from_slice(&scan.scalar);
            }
            scan.scalar.clear();
            if scanned == Scanned::Complete {
                // The byte after a top-level scalar belongs to the object.
                self.end_value();
                return Ok(false);
            }
        }

        match scan.token(b)? {
            Scanned::Held => {}
            Scanned::Byte => {
                if copy {
                    out.put_u8(b);
                }
            }
            Scanned::Complete => {
                if copy {
                    out.put_u8(b);
                }
                self.end_value();
            }
        }
        Ok(true)
    }

    fn end_value(&mut self) {
        self.state = if self.replacing {
            RewriteState::Passthrough
        } else {
            RewriteState::AfterValue
        };
    }

    fn close_object(&mut self, out: &mut BytesMut) {
        if self.insert_missing {
            if !self.first {
                out.put_u8(b',');
            }
            // Serializing a &str to JSON cannot fail.
            let key = serde_json::to_vec(&self.target_key).unwrap_or_default();
            out.extend_from_slice(&key);
            out.put_u8(b':');
            out.extend_from_slice(&self.replacement);
        }
        out.put_u8(b'}');
        self.state = RewriteState::Done;
    }
}

#[inline]
fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[inline]
fn is_scalar_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')
}

fn malformed(message: &str) -> EncodeError {
    EncodeError::MalformedInput(message.to_string())
}

fn unexpected(b: u8, expected: &str) -> EncodeError {
    EncodeError::MalformedInput(format!(
        "expected {}, found '{}'",
        expected,
        (b as char).escape_default()
    ))
}

/// Rewrite a JSON object byte stream, replacing `target_key`'s value.
///
/// Errors reading `input` surface as [`EncodeError::DocumentRead`]; decode
/// failures before the target key as [`EncodeError::MalformedInput`].
pub fn rewrite<S>(
    input: S,
    target_key: &str,
    replacement: &impl Serialize,
) -> Result<BoxStream<'static, Result<Bytes, EncodeError>>, EncodeError>
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    let rewriter = JsonRewriter::new(target_key, replacement)?;
    Ok(rewrite_with(input, rewriter))
}

/// Drive a configured [`JsonRewriter`] over a byte stream.
pub fn rewrite_with<S>(input: S, rewriter: JsonRewriter) -> BoxStream<'static, Result<Bytes, EncodeError>>
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    stream::try_unfold((input.boxed(), Some(rewriter)), next_output).boxed()
}

type RewriteCursor = (BoxStream<'static, std::io::Result<Bytes>>, Option<JsonRewriter>);

async fn next_output(
    (mut input, mut rewriter): RewriteCursor,
) -> Result<Option<(Bytes, RewriteCursor)>, EncodeError> {
    loop {
        let Some(active) = rewriter.as_mut() else {
            return Ok(None);
        };
        match input.next().await {
            Some(chunk) => {
                let output = active.feed(chunk.map_err(EncodeError::document_read)?)?;
                if !output.is_empty() {
                    return Ok(Some((output, (input, rewriter))));
                }
            }
            None => {
                let tail = active.finish()?;
                if tail.is_empty() {
                    return Ok(None);
                }
                return Ok(Some((tail, (input, None))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn run(input: &str, replacement: Value) -> Result<String, EncodeError> {
        let mut rewriter = JsonRewriter::new("_attachments", &replacement)?;
        let mut out = rewriter.feed(Bytes::copy_from_slice(input.as_bytes()))?.to_vec();
        out.extend_from_slice(&rewriter.finish()?);
        Ok(String::from_utf8(out).unwrap())
    }

    fn run_bytewise(input: &str, replacement: Value) -> Result<String, EncodeError> {
        let mut rewriter = JsonRewriter::new("_attachments", &replacement)?;
        let mut out = Vec::new();
        for b in input.as_bytes() {
            out.extend_from_slice(&rewriter.feed(Bytes::copy_from_slice(&[*b]))?);
        }
        out.extend_from_slice(&rewriter.finish()?);
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_replaces_attachments() {
        let out = run(
            r#"{"_id":"doc1","title":"x","_attachments":{"a.txt":{"data":"aGk="}}}"#,
            json!({"a.txt": {"content_type": "text/plain", "follows": true}}),
        )
        .unwrap();
        assert_eq!(
            out,
            r#"{"_id":"doc1","title":"x","_attachments":{"a.txt":{"content_type":"text/plain","follows":true}}}"#
        );
    }

    #[test]
    fn test_without_target_is_identical() {
        let input = r#"{"_id":"doc1","n":1.50,"e":1E+3,"s":"a\"b}","arr":[1,{"x":null}],"t":true}"#;
        assert_eq!(run(input, json!({})).unwrap(), input);
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(run("{}", json!({})).unwrap(), "{}");
        assert_eq!(run("  { }  ", json!({})).unwrap(), "{}");
    }

    #[test]
    fn test_passthrough_after_replacement() {
        let out = run(
            r#"{ "a" : 1 , "_attachments" : {"x":1} , "b" : [1, 2] }"#,
            json!({"r": true}),
        )
        .unwrap();
        assert_eq!(out, r#"{"a":1,"_attachments":{"r":true} , "b" : [1, 2] }"#);
    }

    #[test]
    fn test_remainder_not_tokenized() {
        // Garbage after the target key is forwarded, not validated.
        let out = run(r#"{"_attachments":{},"a":garbage"#, json!(1)).unwrap();
        assert_eq!(out, r#"{"_attachments":1,"a":garbage"#);
    }

    #[test]
    fn test_bytewise_matches_whole() {
        let inputs = [
            r#"{"_id":"d","nested":{"_attachments":{"no":1}},"_attachments":"x","z":[]}"#,
            r#"{"a":"é\\","b":-0.5e-7,"c":[[],[{}]],"d":false}"#,
            "{\n  \"k\": \"v\",\n  \"_attachments\": null\n}\n",
        ];
        for input in inputs {
            let replacement = json!({"s": {"follows": true}});
            assert_eq!(
                run(input, replacement.clone()).unwrap(),
                run_bytewise(input, replacement).unwrap()
            );
        }
    }

    #[test]
    fn test_nested_key_not_replaced() {
        let input = r#"{"a":{"_attachments":1},"b":"_attachments"}"#;
        assert_eq!(run(input, json!("X")).unwrap(), input);
    }

    #[test]
    fn test_escaped_key_matches_target() {
        let out = run(r#"{"_attach\u006dents":{"old":1},"z":0}"#, json!(2)).unwrap();
        assert_eq!(out, r#"{"_attach\u006dents":2,"z":0}"#);
    }

    #[test]
    fn test_strings_with_structural_characters() {
        let out = run(r#"{"a":"}{][,:","_attachments":"{\"}"}"#, json!(null)).unwrap();
        assert_eq!(out, r#"{"a":"}{][,:","_attachments":null}"#);
    }

    #[test]
    fn test_parsed_output_equals_input_with_key_replaced() {
        let inputs = [
            json!({"_id": "a", "_attachments": {"f": 1}, "x": [1, 2, 3]}),
            json!({"first": {"deep": [true, null]}, "_attachments": "inline", "last": 9}),
            json!({"only": "value"}),
        ];
        let replacement = json!({"f": {"content_type": "text/plain", "follows": true}});
        for input in inputs {
            let encoded = serde_json::to_string(&input).unwrap();
            let output: Value = serde_json::from_str(&run(&encoded, replacement.clone()).unwrap()).unwrap();

            let mut expected = input.clone();
            if let Some(slot) = expected.get_mut("_attachments") {
                *slot = replacement.clone();
            }
            assert_eq!(output, expected);
            let keys_in: Vec<_> = input.as_object().unwrap().keys().collect();
            let keys_out: Vec<_> = output.as_object().unwrap().keys().collect();
            assert_eq!(keys_in, keys_out);
        }
    }

    #[test]
    fn test_insert_missing() {
        let mut rewriter = JsonRewriter::new("_attachments", &json!({"a": 1}))
            .unwrap()
            .insert_missing(true);
        let out = rewriter.feed(Bytes::from_static(br#"{"_id":"x"}"#)).unwrap();
        assert_eq!(&out[..], br#"{"_id":"x","_attachments":{"a":1}}"#);

        let mut rewriter = JsonRewriter::new("_attachments", &json!({}))
            .unwrap()
            .insert_missing(true);
        let out = rewriter.feed(Bytes::from_static(b"{}")).unwrap();
        assert_eq!(&out[..], br#"{"_attachments":{}}"#);
    }

    #[test]
    fn test_not_an_object() {
        for input in ["[1,2]", "\"str\"", "42", "null"] {
            assert!(matches!(run(input, json!(1)), Err(EncodeError::MalformedInput(_))));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(run("", json!(1)), Err(EncodeError::MalformedInput(_))));
        assert!(matches!(run("   ", json!(1)), Err(EncodeError::MalformedInput(_))));
    }

    #[test]
    fn test_malformed_before_target() {
        let cases = [
            r#"{"a":tru}"#,
            r#"{"a" 1}"#,
            r#"{"a":1,}"#,
            r#"{"a":1 "b":2}"#,
            r#"{"a":[1}"#,
            r#"{"a":"bad \q escape"}"#,
            r#"{a:1}"#,
            r#"{"a":}"#,
            r#"{"a":1}x"#,
            r#"{"a":[tru],"b":1}"#,
            r#"{"a":[1,,2]}"#,
            r#"{"a":{"k" 1}}"#,
            r#"{"a":{1:2}}"#,
            r#"{"a":[1,]}"#,
            r#"{"a":{"k":1,}}"#,
            r#"{"a":[1 2]}"#,
            r#"{"a":{"k":1]}"#,
            r#"{"a":"\u12g4"}"#,
            r#"{"a":[-]}"#,
        ];
        for input in cases {
            assert!(
                matches!(run(input, json!(1)), Err(EncodeError::MalformedInput(_))),
                "expected failure for {}",
                input
            );
        }
    }

    #[test]
    fn test_truncated_document() {
        assert!(matches!(run(r#"{"a":1"#, json!(1)), Err(EncodeError::MalformedInput(_))));
        assert!(matches!(run(r#"{"a":"x"#, json!(1)), Err(EncodeError::MalformedInput(_))));
    }

    #[test]
    fn test_passthrough_returns_chunk() {
        let mut rewriter = JsonRewriter::new("_attachments", &json!(0)).unwrap();
        rewriter.feed(Bytes::from_static(br#"{"_attachments":1,"#)).unwrap();
        assert!(rewriter.is_passthrough());
        let chunk = Bytes::from_static(br#""rest":true}"#);
        let out = rewriter.feed(chunk.clone()).unwrap();
        assert_eq!(out.as_ptr(), chunk.as_ptr());
    }

    #[tokio::test]
    async fn test_rewrite_stream() {
        let chunks = vec![
            Ok(Bytes::from_static(br#"{"_id":"a","_atta"#)),
            Ok(Bytes::from_static(br#"chments":{},"b":1}"#)),
        ];
        let output: Vec<Bytes> = rewrite(stream::iter(chunks), "_attachments", &json!({"f": 1}))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        let joined: Vec<u8> = output.iter().flat_map(|b| b.iter().copied()).collect();
        assert_eq!(joined, br#"{"_id":"a","_attachments":{"f":1},"b":1}"#.to_vec());
    }

    #[tokio::test]
    async fn test_rewrite_stream_read_error() {
        let chunks = vec![
            Ok(Bytes::from_static(br#"{"_id":"a""#)),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let results: Vec<_> = rewrite(stream::iter(chunks), "_attachments", &json!({}))
            .unwrap()
            .collect()
            .await;
        assert!(results[0].is_ok());
        assert!(matches!(results.last(), Some(Err(EncodeError::DocumentRead(_)))));
    }
}
