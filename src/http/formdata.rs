//! Structured form payloads.
//!
//! `FormData` is the in-memory form a body can carry. It can be parsed from
//! `application/x-www-form-urlencoded` text and encoded as RFC 2046
//! `multipart/form-data` when a transport needs to put it on the wire.

use crate::http::blob::Blob;
use bytes::Bytes;
use std::borrow::Cow;
use url::form_urlencoded;

/// A single form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File { blob: Blob, file_name: String },
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File { .. } => None,
        }
    }
}

/// Ordered multi-map of form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), FormValue::Text(value.into())));
    }

    pub fn append_file(
        &mut self,
        name: impl Into<String>,
        blob: Blob,
        file_name: impl Into<String>,
    ) {
        self.fields.push((
            name.into(),
            FormValue::File {
                blob,
                file_name: file_name.into(),
            },
        ));
    }

    /// Replace every field called `name` with a single text value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = FormValue::Text(value.into());
        match self.fields.iter().position(|(n, _)| *n == name) {
            Some(first) => {
                self.fields[first].1 = value;
                let mut index = 0;
                self.fields.retain(|(n, _)| {
                    let keep = index <= first || *n != name;
                    index += 1;
                    keep
                });
            }
            None => self.fields.push((name, value)),
        }
    }

    pub fn delete(&mut self, name: &str) {
        self.fields.retain(|(n, _)| n != name);
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse `application/x-www-form-urlencoded` text.
    ///
    /// Surrounding whitespace is trimmed, empty segments are skipped, `+`
    /// decodes to a space and each name/value is percent-decoded.
    pub fn from_urlencoded(body: &str) -> Self {
        let mut form = FormData::new();
        for (name, value) in form_urlencoded::parse(body.trim().as_bytes()) {
            form.append(name, value);
        }
        form
    }

    /// Encode as multipart, generating a fresh boundary.
    pub fn to_multipart(&self) -> Multipart {
        let boundary = generate_boundary();
        let mut output = Vec::new();

        for (name, value) in &self.fields {
            // --boundary\r\n
            output.extend_from_slice(b"--");
            output.extend_from_slice(boundary.as_bytes());
            output.extend_from_slice(b"\r\n");

            output.extend_from_slice(format_part_headers(name, value).as_bytes());
            output.extend_from_slice(b"\r\n\r\n");

            match value {
                FormValue::Text(text) => output.extend_from_slice(text.as_bytes()),
                FormValue::File { blob, .. } => output.extend_from_slice(&blob.bytes()),
            }
            output.extend_from_slice(b"\r\n");
        }

        if !self.fields.is_empty() {
            output.extend_from_slice(b"--");
            output.extend_from_slice(boundary.as_bytes());
            output.extend_from_slice(b"--\r\n");
        }

        Multipart {
            content_type: format!("multipart/form-data; boundary={}", boundary),
            body: Bytes::from(output),
        }
    }
}

/// A multipart-encoded form ready for sending.
#[derive(Debug, Clone)]
pub struct Multipart {
    pub content_type: String,
    pub body: Bytes,
}

fn format_part_headers(name: &str, value: &FormValue) -> String {
    let mut header = format!(
        "Content-Disposition: form-data; name=\"{}\"",
        escape_quotes(name)
    );

    if let FormValue::File { blob, file_name } = value {
        header.push_str(&format!("; filename=\"{}\"", escape_quotes(file_name)));
        let mime = if blob.mime_type().is_empty() {
            "application/octet-stream"
        } else {
            blob.mime_type()
        };
        header.push_str(&format!("\r\nContent-Type: {}", mime));
    }

    header
}

/// Escape quotes and backslashes in a string.
fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    format!("----xhrfetch-boundary-{:016x}{:08x}", nanos, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded_plus_and_percent() {
        let form = FormData::from_urlencoded("first+name=Jane+Doe&city=S%C3%A3o%20Paulo");
        assert_eq!(form.get("first name").and_then(|v| v.as_text()), Some("Jane Doe"));
        assert_eq!(form.get("city").and_then(|v| v.as_text()), Some("São Paulo"));
    }

    #[test]
    fn test_urlencoded_value_keeps_later_equals() {
        let form = FormData::from_urlencoded("expr=a=b");
        assert_eq!(form.get("expr").and_then(|v| v.as_text()), Some("a=b"));
    }

    #[test]
    fn test_urlencoded_skips_empty_segments_and_trims() {
        let form = FormData::from_urlencoded("  a=1&&b=2\n");
        assert_eq!(form.len(), 2);
        assert_eq!(form.get("b").and_then(|v| v.as_text()), Some("2"));
    }

    #[test]
    fn test_repeated_names() {
        let form = FormData::from_urlencoded("tag=a&tag=b");
        assert_eq!(form.get_all("tag").len(), 2);
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut form = FormData::new();
        form.append("a", "1");
        form.append("b", "2");
        form.append("a", "3");
        form.set("a", "x");
        let names: Vec<_> = form.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(form.get("a").and_then(|v| v.as_text()), Some("x"));
    }

    #[test]
    fn test_multipart_encoding() {
        let mut form = FormData::new();
        form.append("field", "value");
        form.append_file("upload", Blob::new(b"file data".to_vec(), "text/plain"), "a\"b.txt");

        let encoded = form.to_multipart();
        assert!(encoded
            .content_type
            .starts_with("multipart/form-data; boundary=----xhrfetch-boundary-"));

        let body = String::from_utf8_lossy(&encoded.body);
        assert!(body.contains("name=\"field\""));
        assert!(body.contains("filename=\"a\\\"b.txt\""));
        assert!(body.contains("Content-Type: text/plain"));
        assert!(body.contains("file data"));
        assert!(body.ends_with("--\r\n"));
    }

    #[test]
    fn test_empty_multipart() {
        assert!(FormData::new().to_multipart().body.is_empty());
    }
}
