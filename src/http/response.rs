//! Completed or synthesized call result.

use crate::base::fetcherror::FetchError;
use crate::http::blob::Blob;
use crate::http::body::{Body, BodyInit};
use crate::http::formdata::FormData;
use crate::http::headers::{Headers, HeadersInit};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Status some legacy transports report instead of 204.
const LEGACY_NO_CONTENT: u16 = 1223;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Default,
    Basic,
    Cors,
    Opaque,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseInit {
    /// Defaults to 200.
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Option<HeadersInit>,
    pub url: Option<String>,
    pub response_type: Option<ResponseType>,
    /// Force `redirected` for responses the client synthesizes itself.
    pub redirected: bool,
}

impl ResponseInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }
}

#[derive(Debug)]
pub struct Response {
    status: u16,
    status_text: String,
    response_type: ResponseType,
    url: String,
    redirected: bool,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Build a response; the status must fall in `[200, 599]` after the
    /// legacy 1223 remap.
    pub fn new(body: Option<BodyInit>, init: ResponseInit) -> Result<Self, FetchError> {
        let mut status = init.status.unwrap_or(200);
        if status == LEGACY_NO_CONTENT {
            status = 204;
        }
        if !(200..=599).contains(&status) {
            return Err(FetchError::InvalidStatus { status });
        }

        let mut headers = match init.headers {
            Some(h) => Headers::from_init(h)?,
            None => Headers::new(),
        };
        let body = Body::new(body, &mut headers)?;

        Ok(Response {
            status,
            status_text: init
                .status_text
                .unwrap_or_else(|| default_status_text(status).to_string()),
            response_type: init.response_type.unwrap_or_default(),
            url: init.url.unwrap_or_default(),
            redirected: init.redirected || REDIRECT_STATUSES.contains(&status),
            headers,
            body,
        })
    }

    /// Network-level failure sentinel.
    pub fn error() -> Self {
        Self::sentinel(ResponseType::Error)
    }

    /// Stand-in for a cross-origin `no-cors` result.
    pub fn opaque() -> Self {
        Self::sentinel(ResponseType::Opaque)
    }

    fn sentinel(response_type: ResponseType) -> Self {
        Response {
            status: 0,
            status_text: String::new(),
            response_type,
            url: String::new(),
            redirected: false,
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// A bodiless redirect to `url`.
    pub fn redirect(url: &str, status: u16) -> Result<Self, FetchError> {
        if !REDIRECT_STATUSES.contains(&status) {
            return Err(FetchError::InvalidStatus { status });
        }
        let headers = Headers::from_init([("Location", url)])?;
        Response::new(None, ResponseInit::new().status(status).headers(headers))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn redirected(&self) -> bool {
        self.redirected
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_used(&self) -> bool {
        self.body.body_used()
    }

    pub fn text(&self) -> BoxFuture<'static, Result<String, FetchError>> {
        self.body.text()
    }

    pub fn blob(&self) -> BoxFuture<'static, Result<Blob, FetchError>> {
        self.body.blob()
    }

    pub fn array_buffer(&self) -> BoxFuture<'static, Result<Bytes, FetchError>> {
        self.body.array_buffer()
    }

    pub fn form_data(&self) -> BoxFuture<'static, Result<FormData, FetchError>> {
        self.body.form_data()
    }

    pub fn json<T>(&self) -> BoxFuture<'static, Result<T, FetchError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.body.json()
    }
}

impl Clone for Response {
    /// Deep-copies headers; the payload is shared behind a fresh `bodyUsed`.
    fn clone(&self) -> Self {
        Response {
            status: self.status,
            status_text: self.status_text.clone(),
            response_type: self.response_type,
            url: self.url.clone(),
            redirected: self.redirected,
            headers: self.headers.clone(),
            body: self.body.share(),
        }
    }
}

fn default_status_text(status: u16) -> &'static str {
    if status == 200 {
        "OK"
    } else {
        ""
    }
}
