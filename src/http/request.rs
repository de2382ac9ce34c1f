//! Outgoing request descriptor.

use crate::base::fetcherror::FetchError;
use crate::base::origin::normalize_url;
use crate::http::blob::Blob;
use crate::http::body::{Body, BodyInit};
use crate::http::formdata::FormData;
use crate::http::headers::{Headers, HeadersInit};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// HTTP methods whose capitalization is normalized.
const METHODS: [&str; 6] = ["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

pub const DEFAULT_REFERRER: &str = "about:client";

/// Uppercase canonical verbs; pass anything else through verbatim.
pub fn normalize_method(method: &str) -> String {
    let upcased = method.to_ascii_uppercase();
    if METHODS.contains(&upcased.as_str()) {
        upcased
    } else {
        method.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
}

impl RequestMode {
    /// Unknown values fall back to `cors`.
    pub fn parse_lossy(mode: &str) -> Self {
        match mode {
            "no-cors" => RequestMode::NoCors,
            "same-origin" => RequestMode::SameOrigin,
            "navigate" => RequestMode::Navigate,
            _ => RequestMode::Cors,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Cors => "cors",
            RequestMode::NoCors => "no-cors",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::Navigate => "navigate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCredentials {
    #[default]
    Omit,
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestRedirect {
    #[default]
    Follow,
    Error,
    Manual,
}

/// Options bag for [`Request`] construction and `fetch`.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: Option<HeadersInit>,
    pub body: Option<BodyInit>,
    pub mode: Option<RequestMode>,
    pub credentials: Option<RequestCredentials>,
    pub redirect: Option<RequestRedirect>,
    pub referrer: Option<String>,
    pub referrer_policy: Option<String>,
    /// Transport timeout; `None` leaves the client default in place.
    pub timeout: Option<Duration>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn body(mut self, body: impl Into<BodyInit>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn credentials(mut self, credentials: RequestCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn redirect(mut self, redirect: RequestRedirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn referrer_policy(mut self, policy: impl Into<String>) -> Self {
        self.referrer_policy = Some(policy.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What a request is built from: a URL or another request.
#[derive(Debug, Clone)]
pub enum RequestInput<'a> {
    Url(Cow<'a, str>),
    Request(&'a Request),
}

impl<'a> From<&'a str> for RequestInput<'a> {
    fn from(s: &'a str) -> Self {
        RequestInput::Url(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for RequestInput<'a> {
    fn from(s: &'a String) -> Self {
        RequestInput::Url(Cow::Borrowed(s.as_str()))
    }
}

impl From<String> for RequestInput<'_> {
    fn from(s: String) -> Self {
        RequestInput::Url(Cow::Owned(s))
    }
}

impl<'a> From<&'a Url> for RequestInput<'a> {
    fn from(u: &'a Url) -> Self {
        RequestInput::Url(Cow::Borrowed(u.as_str()))
    }
}

impl<'a> From<&'a Request> for RequestInput<'a> {
    fn from(r: &'a Request) -> Self {
        RequestInput::Request(r)
    }
}

#[derive(Debug)]
pub struct Request {
    url: Url,
    method: String,
    mode: RequestMode,
    credentials: RequestCredentials,
    redirect: RequestRedirect,
    referrer: String,
    referrer_policy: String,
    headers: Headers,
    body: Body,
    timeout: Option<Duration>,
}

impl Request {
    /// Build a request. URL inputs must be absolute.
    pub fn new<'a>(
        input: impl Into<RequestInput<'a>>,
        init: RequestInit,
    ) -> Result<Self, FetchError> {
        Self::with_base(input, init, None)
    }

    /// Build a request, resolving relative URL inputs against `base`.
    pub fn with_base<'a>(
        input: impl Into<RequestInput<'a>>,
        init: RequestInit,
        base: Option<&Url>,
    ) -> Result<Self, FetchError> {
        match input.into() {
            RequestInput::Url(raw) => Self::from_url(&raw, init, base),
            RequestInput::Request(source) => Self::from_request(source, init),
        }
    }

    fn from_url(raw: &str, init: RequestInit, base: Option<&Url>) -> Result<Self, FetchError> {
        let url = normalize_url(raw, base)?;
        let method = init
            .method
            .as_deref()
            .map(normalize_method)
            .unwrap_or_else(|| "GET".to_string());
        check_body_allowed(&method, init.body.as_ref())?;

        let mut headers = match init.headers {
            Some(h) => Headers::from_init(h)?,
            None => Headers::new(),
        };
        let body = Body::new(init.body, &mut headers)?;

        Ok(Request {
            url,
            method,
            mode: init.mode.unwrap_or_default(),
            credentials: init.credentials.unwrap_or_default(),
            redirect: init.redirect.unwrap_or_default(),
            referrer: init
                .referrer
                .unwrap_or_else(|| DEFAULT_REFERRER.to_string()),
            referrer_policy: init.referrer_policy.unwrap_or_default(),
            headers,
            body,
            timeout: init.timeout,
        })
    }

    /// Copy `source`, taking over its body unless `init` supplies one.
    fn from_request(source: &Request, init: RequestInit) -> Result<Self, FetchError> {
        if source.body_used() {
            return Err(FetchError::AlreadyConsumed);
        }

        let method = init
            .method
            .as_deref()
            .map(normalize_method)
            .unwrap_or_else(|| source.method.clone());

        let transfer = init.body.is_none() && !source.body.is_null();
        let body_init = match init.body {
            Some(body) => Some(body),
            None => source.body.data().cloned().map(BodyInit::Data),
        };
        check_body_allowed(&method, body_init.as_ref())?;

        let mut headers = match init.headers {
            Some(h) => Headers::from_init(h)?,
            None => source.headers.clone(),
        };
        let body = Body::new(body_init, &mut headers)?;

        if transfer {
            source.body.claim()?;
        }

        Ok(Request {
            url: source.url.clone(),
            method,
            mode: init.mode.unwrap_or(source.mode),
            credentials: init.credentials.unwrap_or(source.credentials),
            redirect: init.redirect.unwrap_or(source.redirect),
            referrer: init.referrer.unwrap_or_else(|| source.referrer.clone()),
            referrer_policy: init
                .referrer_policy
                .unwrap_or_else(|| source.referrer_policy.clone()),
            headers,
            body,
            timeout: init.timeout.or(source.timeout),
        })
    }

    /// A copy carrying the current body payload, leaving `self` unconsumed.
    pub fn try_clone(&self) -> Result<Request, FetchError> {
        let init = RequestInit {
            body: self.body.data().cloned().map(BodyInit::Data),
            ..RequestInit::default()
        };
        Request::new(self, init)
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn parsed_url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn credentials(&self) -> RequestCredentials {
        self.credentials
    }

    pub fn redirect(&self) -> RequestRedirect {
        self.redirect
    }

    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    pub fn referrer_policy(&self) -> &str {
        &self.referrer_policy
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
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

fn check_body_allowed(method: &str, body: Option<&BodyInit>) -> Result<(), FetchError> {
    let has_body = body.is_some_and(|b| !b.is_empty_text());
    if has_body && (method == "GET" || method == "HEAD") {
        return Err(FetchError::BodyNotAllowed {
            method: method.to_string(),
        });
    }
    Ok(())
}
