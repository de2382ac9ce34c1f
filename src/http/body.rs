//! Body payloads with single-consumption reads.
//!
//! A [`Body`] is shared by composition between `Request` and `Response`.
//! Every read method claims the body synchronously, before the returned
//! future is polled, so a second read issued before the first completes
//! already observes `body_used() == true` and fails with `AlreadyConsumed`.

use crate::base::fetcherror::FetchError;
use crate::http::blob::Blob;
use crate::http::formdata::FormData;
use crate::http::headers::Headers;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::form_urlencoded;

pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=UTF-8";
pub const FORM_URLENCODED_UTF8: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// The stored payload. Cloning shares the underlying buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyData {
    Text(Arc<str>),
    Blob(Blob),
    Buffer(Bytes),
    Form(Arc<FormData>),
}

impl BodyData {
    pub fn kind(&self) -> &'static str {
        match self {
            BodyData::Text(_) => "text",
            BodyData::Blob(_) => "Blob",
            BodyData::Buffer(_) => "ArrayBuffer",
            BodyData::Form(_) => "FormData",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            BodyData::Text(text) => text.is_empty(),
            BodyData::Blob(blob) => blob.size() == 0,
            BodyData::Buffer(bytes) => bytes.is_empty(),
            BodyData::Form(form) => form.is_empty(),
        }
    }

    fn inferred_content_type(&self) -> Option<String> {
        match self {
            BodyData::Text(_) => Some(TEXT_PLAIN_UTF8.to_string()),
            BodyData::Blob(blob) if !blob.mime_type().is_empty() => {
                Some(blob.mime_type().to_string())
            }
            _ => None,
        }
    }
}

/// Values a body can be constructed from.
#[derive(Debug, Clone)]
pub enum BodyInit {
    Text(String),
    Blob(Blob),
    Form(FormData),
    /// Query-string pairs, serialised as urlencoded text.
    SearchParams(Vec<(String, String)>),
    Bytes(Bytes),
    /// An already-stored payload, e.g. forwarded by `clone`.
    Data(BodyData),
}

impl BodyInit {
    pub fn search_params<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        BodyInit::SearchParams(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Serialize `value` to a JSON string body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, FetchError> {
        Ok(BodyInit::Text(serde_json::to_string(value)?))
    }

    fn into_parts(self) -> (BodyData, Option<String>) {
        let data = match self {
            BodyInit::SearchParams(pairs) => {
                let text = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                return (
                    BodyData::Text(text.into()),
                    Some(FORM_URLENCODED_UTF8.to_string()),
                );
            }
            BodyInit::Text(text) => BodyData::Text(text.into()),
            BodyInit::Blob(blob) => BodyData::Blob(blob),
            BodyInit::Form(form) => BodyData::Form(Arc::new(form)),
            BodyInit::Bytes(bytes) => BodyData::Buffer(bytes),
            BodyInit::Data(data) => data,
        };
        let content_type = data.inferred_content_type();
        (data, content_type)
    }

    pub(crate) fn is_empty_text(&self) -> bool {
        match self {
            BodyInit::Text(text) => text.is_empty(),
            BodyInit::Data(BodyData::Text(text)) => text.is_empty(),
            _ => false,
        }
    }
}

impl From<String> for BodyInit {
    fn from(s: String) -> Self {
        BodyInit::Text(s)
    }
}

impl From<&str> for BodyInit {
    fn from(s: &str) -> Self {
        BodyInit::Text(s.to_owned())
    }
}

impl From<Bytes> for BodyInit {
    fn from(b: Bytes) -> Self {
        BodyInit::Bytes(b)
    }
}

impl From<Vec<u8>> for BodyInit {
    fn from(v: Vec<u8>) -> Self {
        BodyInit::Bytes(Bytes::from(v))
    }
}

impl From<Blob> for BodyInit {
    fn from(b: Blob) -> Self {
        BodyInit::Blob(b)
    }
}

impl From<FormData> for BodyInit {
    fn from(f: FormData) -> Self {
        BodyInit::Form(f)
    }
}

impl From<BodyData> for BodyInit {
    fn from(d: BodyData) -> Self {
        BodyInit::Data(d)
    }
}

/// Payload plus the `bodyUsed` flag.
#[derive(Debug, Default)]
pub struct Body {
    data: Option<BodyData>,
    used: AtomicBool,
}

impl Body {
    /// A null body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store `init`, setting Content-Type from the payload unless one is
    /// already present in `headers`.
    pub fn new(init: Option<BodyInit>, headers: &mut Headers) -> Result<Self, FetchError> {
        let data = match init {
            Some(init) => {
                let (data, content_type) = init.into_parts();
                if let Some(content_type) = content_type {
                    if !headers.has("Content-Type") {
                        headers.set("Content-Type", &content_type)?;
                    }
                }
                Some(data)
            }
            None => None,
        };

        Ok(Self {
            data,
            used: AtomicBool::new(false),
        })
    }

    pub fn data(&self) -> Option<&BodyData> {
        self.data.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn body_used(&self) -> bool {
        self.used.load(Ordering::SeqCst)
    }

    /// A fresh wrapper over the same payload with its own `bodyUsed` flag.
    pub fn share(&self) -> Body {
        Body {
            data: self.data.clone(),
            used: AtomicBool::new(false),
        }
    }

    /// Mark the body used and hand back its payload.
    pub(crate) fn claim(&self) -> Result<Option<BodyData>, FetchError> {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(FetchError::AlreadyConsumed);
        }
        Ok(self.data.clone())
    }

    pub fn text(&self) -> BoxFuture<'static, Result<String, FetchError>> {
        let claimed = self.claim();
        async move { read_text(claimed?).await }.boxed()
    }

    pub fn blob(&self) -> BoxFuture<'static, Result<Blob, FetchError>> {
        let claimed = self.claim();
        async move { read_blob(claimed?) }.boxed()
    }

    pub fn array_buffer(&self) -> BoxFuture<'static, Result<Bytes, FetchError>> {
        let claimed = self.claim();
        async move { read_array_buffer(claimed?).await }.boxed()
    }

    pub fn form_data(&self) -> BoxFuture<'static, Result<FormData, FetchError>> {
        let claimed = self.claim();
        async move {
            match claimed? {
                Some(BodyData::Form(form)) => Ok((*form).clone()),
                other => Ok(FormData::from_urlencoded(&read_text(other).await?)),
            }
        }
        .boxed()
    }

    pub fn json<T>(&self) -> BoxFuture<'static, Result<T, FetchError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let claimed = self.claim();
        async move {
            let text = read_text(claimed?).await?;
            Ok(serde_json::from_str(&text)?)
        }
        .boxed()
    }
}

fn unsupported(data: &BodyData, to: &'static str) -> FetchError {
    FetchError::UnsupportedConversion {
        from: data.kind(),
        to,
    }
}

/// Byte-by-byte decoding of a raw buffer.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

async fn read_text(data: Option<BodyData>) -> Result<String, FetchError> {
    match data {
        None => Ok(String::new()),
        Some(BodyData::Text(text)) => Ok(text.to_string()),
        Some(BodyData::Blob(blob)) => Ok(blob.text().await),
        Some(BodyData::Buffer(bytes)) => Ok(latin1(&bytes)),
        Some(data @ BodyData::Form(_)) => Err(unsupported(&data, "text")),
    }
}

fn read_blob(data: Option<BodyData>) -> Result<Blob, FetchError> {
    match data {
        None => Ok(Blob::default()),
        Some(BodyData::Text(text)) => Ok(Blob::untyped(Bytes::from(text.to_string()))),
        Some(BodyData::Blob(blob)) => Ok(blob),
        Some(BodyData::Buffer(bytes)) => Ok(Blob::untyped(bytes)),
        Some(data @ BodyData::Form(_)) => Err(unsupported(&data, "blob")),
    }
}

async fn read_array_buffer(data: Option<BodyData>) -> Result<Bytes, FetchError> {
    match data {
        Some(BodyData::Buffer(bytes)) => Ok(bytes),
        Some(data @ BodyData::Form(_)) => Err(unsupported(&data, "arrayBuffer")),
        other => Ok(read_blob(other)?.array_buffer().await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(init: impl Into<BodyInit>) -> (Body, Headers) {
        let mut headers = Headers::new();
        let body = Body::new(Some(init.into()), &mut headers).unwrap();
        (body, headers)
    }

    #[test]
    fn test_text_infers_content_type() {
        let (_, headers) = body("hello");
        assert_eq!(headers.get("content-type"), Some(TEXT_PLAIN_UTF8));
    }

    #[test]
    fn test_explicit_content_type_kept() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json").unwrap();
        Body::new(Some("{}".into()), &mut headers).unwrap();
        assert_eq!(headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn test_blob_type_inferred() {
        let (_, headers) = body(Blob::new(b"\x89PNG".to_vec(), "image/png"));
        assert_eq!(headers.get("content-type"), Some("image/png"));

        let (_, headers) = body(Blob::untyped(b"raw".to_vec()));
        assert!(!headers.has("content-type"));
    }

    #[test]
    fn test_search_params_inferred() {
        let (body, headers) = body(BodyInit::search_params([("q", "a b"), ("n", "1")]));
        assert_eq!(headers.get("content-type"), Some(FORM_URLENCODED_UTF8));
        assert_eq!(body.data(), Some(&BodyData::Text("q=a+b&n=1".into())));
    }

    #[test]
    fn test_buffer_and_form_not_inferred() {
        let (_, headers) = body(vec![1u8, 2, 3]);
        assert!(!headers.has("content-type"));

        let (_, headers) = body(FormData::new());
        assert!(!headers.has("content-type"));
    }

    #[test]
    fn test_claim_is_synchronous() {
        let (body, _) = body("once");
        let first = body.text();
        assert!(body.body_used());
        let second = body.text();
        drop(first);
        let result = futures::executor::block_on(second);
        assert_eq!(result, Err(FetchError::AlreadyConsumed));
    }

    #[test]
    fn test_latin1_buffer_text() {
        let (body, _) = body(vec![0x48u8, 0xE9, 0xFF]);
        let text = futures::executor::block_on(body.text()).unwrap();
        assert_eq!(text, "H\u{e9}\u{ff}");
    }

    #[test]
    fn test_form_to_blob_unsupported() {
        let (body, _) = body(FormData::new());
        let err = futures::executor::block_on(body.blob()).unwrap_err();
        assert_eq!(
            err,
            FetchError::UnsupportedConversion {
                from: "FormData",
                to: "blob"
            }
        );
        assert!(body.body_used());
    }

    #[test]
    fn test_share_tracks_used_separately() {
        let (body, _) = body(Bytes::from_static(b"payload"));
        let shared = body.share();
        futures::executor::block_on(body.array_buffer()).unwrap();
        assert!(body.body_used());
        assert!(!shared.body_used());

        let bytes = futures::executor::block_on(shared.array_buffer()).unwrap();
        assert_eq!(&bytes[..], b"payload");
    }
}
