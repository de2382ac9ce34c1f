//! Immutable binary payload with a MIME type hint.

use bytes::Bytes;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
    mime_type: String,
}

impl Blob {
    /// Create a blob. The type is lowercased; an empty type means unknown.
    pub fn new(data: impl Into<Bytes>, mime_type: impl AsRef<str>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.as_ref().to_ascii_lowercase(),
        }
    }

    /// A blob without a declared type.
    pub fn untyped(data: impl Into<Bytes>) -> Self {
        Self::new(data, "")
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Shared handle on the underlying bytes.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Read the contents as bytes.
    pub async fn array_buffer(&self) -> Bytes {
        tokio::task::yield_now().await;
        self.data.clone()
    }

    /// Read the contents as UTF-8 text, replacing invalid sequences.
    pub async fn text(&self) -> String {
        tokio::task::yield_now().await;
        String::from_utf8_lossy(&self.data).into_owned()
    }
}
