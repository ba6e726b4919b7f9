//! Envelope text codec
//!
//! ## Format
//!
//! ```text
//! {
//!     "Author": "alice@example.com",
//!     "Time": "2024-05-01T10:00:00.5Z",
//!     "ParentMessage": "msg1-bob@example.com.txt",
//!     "Title": "trip"
//! }
//! -------------------------- END HEADER --------------------------
//!
//! <raw content bytes>
//!
//! -------------------------- SIGNATURE ---------------------------
//! <R, base 16>
//! <S, base 16>
//! ```
//!
//! Everything up to and including the content is the signable payload; its
//! SHA-256 hash is what gets signed. The header encoder is byte-stable: fixed
//! field order, four-space indent, Go-style string escaping and RFC 3339 time
//! with trailing fractional zeros trimmed. Decoding and re-encoding a message
//! therefore reproduces the signed bytes exactly.

use std::io;

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use sha2::{Digest, Sha256};

use super::name::MsgName;
use crate::error::{ConverseError, ConverseResult};
use crate::identity::Signature;
use crate::types::UserName;

/// Separates the header from the content.
pub const HEADER_END_MARKER: &str =
    "-------------------------- END HEADER --------------------------\n\n";

/// Separates the content from the signature integers.
pub const SIGNATURE_MARKER: &str =
    "\n\n-------------------------- SIGNATURE ---------------------------";

/// Structured header fields, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Header {
    #[serde(rename = "Author")]
    pub author: UserName,
    #[serde(rename = "Time", with = "rfc3339_trimmed")]
    pub time: DateTime<FixedOffset>,
    #[serde(rename = "ParentMessage", default)]
    pub parent: String,
    #[serde(rename = "Title", default)]
    pub title: String,
}

/// A decoded envelope, before it becomes a [`super::Message`].
#[derive(Debug)]
pub(crate) struct Decoded {
    pub header: Header,
    pub parent: Option<MsgName>,
    pub content: Vec<u8>,
    pub signature: Signature,
}

/// Canonical header bytes followed by the header-end marker and the content.
pub(crate) fn signable_payload(header: &Header, content: &[u8]) -> ConverseResult<Vec<u8>> {
    let mut out = Vec::with_capacity(256 + content.len());
    let mut ser = serde_json::Serializer::with_formatter(&mut out, GoJsonFormatter::new());
    header
        .serialize(&mut ser)
        .map_err(|e| ConverseError::Serialization(format!("failed to encode header: {}", e)))?;
    out.push(b'\n');
    out.extend_from_slice(HEADER_END_MARKER.as_bytes());
    out.extend_from_slice(content);
    Ok(out)
}

/// Signature marker plus the two integers, newline-delimited.
pub(crate) fn signature_block(signature: &Signature) -> String {
    format!(
        "{}\n{}\n{}\n",
        SIGNATURE_MARKER,
        signature.r_text(),
        signature.s_text()
    )
}

/// SHA-256 of a signable payload.
pub fn content_hash(payload: &[u8]) -> [u8; 32] {
    Sha256::digest(payload).into()
}

/// Split an envelope into header, content and signature.
///
/// The header ends at the first header marker. The signature starts at the
/// last signature marker, so the marker text may appear inside content.
pub(crate) fn decode(data: &[u8]) -> ConverseResult<Decoded> {
    let header_end = find(data, HEADER_END_MARKER.as_bytes()).ok_or_else(|| {
        ConverseError::MalformedEnvelope("failed to find header end marker".to_string())
    })?;
    let sig_start = rfind(data, SIGNATURE_MARKER.as_bytes()).ok_or_else(|| {
        ConverseError::MalformedEnvelope("failed to find signature marker".to_string())
    })?;
    let content_start = header_end + HEADER_END_MARKER.len();
    if sig_start < content_start {
        return Err(ConverseError::MalformedEnvelope(
            "signature marker precedes end of header".to_string(),
        ));
    }

    let header: Header = serde_json::from_slice(&data[..header_end])
        .map_err(|e| ConverseError::MalformedEnvelope(format!("malformed header: {}", e)))?;
    let parent = if header.parent.is_empty() {
        None
    } else {
        Some(MsgName::parse(&header.parent).map_err(|e| {
            ConverseError::MalformedEnvelope(format!("bad parent reference: {}", e))
        })?)
    };

    let footer = std::str::from_utf8(&data[sig_start + SIGNATURE_MARKER.len()..])
        .map_err(|_| ConverseError::MalformedEnvelope("signature is not text".to_string()))?;
    let parts: Vec<&str> = footer.trim().split('\n').map(str::trim).collect();
    let [r, s] = parts.as_slice() else {
        return Err(ConverseError::MalformedEnvelope(format!(
            "expected 2 signature components, found {}",
            parts.len()
        )));
    };
    let signature = Signature::from_text_parts(r, s)?;

    Ok(Decoded {
        header,
        parent,
        content: data[content_start..sig_start].to_vec(),
        signature,
    })
}

/// RFC 3339 with nanoseconds, trailing fractional zeros trimmed, `Z` for UTC.
pub fn format_time(time: &DateTime<FixedOffset>) -> String {
    let mut out = time.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = time.nanosecond() % 1_000_000_000;
    if nanos != 0 {
        let frac = format!("{:09}", nanos);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    if time.offset().local_minus_utc() == 0 {
        out.push('Z');
    } else {
        out.push_str(&time.format("%:z").to_string());
    }
    out
}

mod rfc3339_trimmed {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text).map_err(serde::de::Error::custom)
    }
}

/// Pretty printer with a four-space indent that also escapes `<`, `>`, `&`
/// and the two Unicode line separators, matching Go's `encoding/json`.
struct GoJsonFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl GoJsonFormatter<'_> {
    fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(b"    "),
        }
    }
}

impl Formatter for GoJsonFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.begin_array(w)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.end_array(w)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(w, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.end_array_value(w)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.begin_object(w)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.end_object(w)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(w, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(w)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.inner.end_object_value(w)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        w: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            w.write_all(fragment[start..i].as_bytes())?;
            w.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }
        w.write_all(fragment[start..].as_bytes())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(title: &str) -> Header {
        Header {
            author: "alice@example.com".into(),
            time: DateTime::parse_from_rfc3339("2024-05-01T10:00:00.500Z").unwrap(),
            parent: String::new(),
            title: title.to_string(),
        }
    }

    #[test]
    fn test_header_layout() {
        let payload = signable_payload(&header("trip"), b"hi").unwrap();
        let expected = "{\n    \"Author\": \"alice@example.com\",\n    \"Time\": \"2024-05-01T10:00:00.5Z\",\n    \"ParentMessage\": \"\",\n    \"Title\": \"trip\"\n}\n-------------------------- END HEADER --------------------------\n\nhi";
        assert_eq!(String::from_utf8(payload).unwrap(), expected);
    }

    #[test]
    fn test_go_style_escaping() {
        let payload = signable_payload(&header("<a & b>"), b"").unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.contains(r#""Title": "\u003ca \u0026 b\u003e""#));

        let end = text.find(HEADER_END_MARKER).unwrap();
        let parsed: Header = serde_json::from_str(&text[..end]).unwrap();
        assert_eq!(parsed.title, "<a & b>");
    }

    #[test]
    fn test_time_format() {
        let t = DateTime::parse_from_rfc3339("2017-03-04T05:06:07Z").unwrap();
        assert_eq!(format_time(&t), "2017-03-04T05:06:07Z");

        let t = DateTime::parse_from_rfc3339("2017-03-04T05:06:07.123456789-06:00").unwrap();
        assert_eq!(format_time(&t), "2017-03-04T05:06:07.123456789-06:00");

        let t = DateTime::parse_from_rfc3339("2017-03-04T05:06:07.120+05:30").unwrap();
        assert_eq!(format_time(&t), "2017-03-04T05:06:07.12+05:30");
    }

    #[test]
    fn test_decode_missing_markers() {
        let err = decode(b"no markers here").unwrap_err();
        assert!(matches!(err, ConverseError::MalformedEnvelope(_)));

        let mut data = signable_payload(&header("t"), b"body").unwrap();
        let err = decode(&data).unwrap_err();
        assert!(err.to_string().contains("signature marker"));

        data.extend_from_slice(format!("{}\n1\n", SIGNATURE_MARKER).as_bytes());
        let err = decode(&data).unwrap_err();
        assert!(err.to_string().contains("expected 2 signature components"));
    }

    #[test]
    fn test_decode_bad_header() {
        let text = format!("{{not json\n{}body{}\n1\n2\n", HEADER_END_MARKER, SIGNATURE_MARKER);
        let err = decode(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("malformed header"));
    }

    #[test]
    fn test_decode_uses_last_signature_marker() {
        let content = format!("quoting{}\nnot\na signature", SIGNATURE_MARKER);
        let mut data = signable_payload(&header("t"), content.as_bytes()).unwrap();
        data.extend_from_slice(format!("{}\nab\ncd\n", SIGNATURE_MARKER).as_bytes());

        let decoded = decode(&data).unwrap();
        assert_eq!(decoded.content, content.as_bytes());
        assert_eq!(decoded.signature.r_text(), "ab");
        assert_eq!(decoded.signature.s_text(), "cd");
    }

    #[test]
    fn test_decode_rejects_bad_parent() {
        let mut h = header("t");
        h.parent = "not-a-message".to_string();
        let mut data = signable_payload(&h, b"x").unwrap();
        data.extend_from_slice(format!("{}\n1\n2\n", SIGNATURE_MARKER).as_bytes());
        assert!(matches!(
            decode(&data).unwrap_err(),
            ConverseError::MalformedEnvelope(_)
        ));
    }
}
