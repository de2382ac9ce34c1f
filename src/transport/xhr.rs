//! XMLHttpRequest-style transport over hyper HTTP/1.1.
//!
//! One TCP connection per `send`, driven on the ambient tokio runtime.
//! Redirects are followed transparently and the final URL is reported via
//! `response_url`. Completion is signalled through the raw handler slots in
//! the same order a browser XHR uses: readystatechange for each state, then
//! the terminal `load`/`error`/`timeout`/`abort` slot.

use crate::base::fetcherror::TransportError;
use crate::base::origin::strip_fragment;
use crate::http::blob::Blob;
use crate::http::body::BodyData;
use crate::transport::{
    Capabilities, HandlerSlot, LegacyTransport, RawHandler, ReadyState, ResponseKind,
    TransportFactory,
};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, LOCATION};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

/// Chromium default.
const REDIRECT_LIMIT: usize = 20;

/// Capabilities of the restricted cross-domain variant (XDomainRequest-like).
const CROSS_DOMAIN: Capabilities = Capabilities {
    onload: true,
    with_credentials: false,
    timeout: true,
    request_headers: false,
    response_headers: false,
    response_url: false,
    binary_response: false,
};

#[derive(Debug, Error)]
enum XhrFailure {
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid request: {0}")]
    Request(#[from] http::Error),
    #[error("unsupported url {0}")]
    Url(String),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("timed out")]
    Timeout,
}

type SharedHandler = Arc<Mutex<RawHandler>>;

#[derive(Default)]
struct Shared {
    ready_state: ReadyState,
    /// Bumped by `open` and `abort` so a stale task cannot publish results.
    generation: u64,
    sent: bool,
    status: u16,
    status_text: String,
    raw_headers: Option<String>,
    response_url: Option<String>,
    content_type: String,
    body: Option<Bytes>,
    handlers: HashMap<HandlerSlot, SharedHandler>,
}

impl Shared {
    fn reset_response(&mut self) {
        self.status = 0;
        self.status_text.clear();
        self.raw_headers = None;
        self.response_url = None;
        self.content_type.clear();
        self.body = None;
    }
}

struct Loaded {
    status: StatusCode,
    raw_headers: String,
    content_type: String,
    url: Url,
    body: Bytes,
}

struct Outgoing {
    method: Method,
    url: Url,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    content_type: Option<String>,
}

pub struct HyperXhr {
    capabilities: Capabilities,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
    method: Option<Method>,
    url: Option<Url>,
    headers: Vec<(HeaderName, HeaderValue)>,
    timeout: Option<Duration>,
    with_credentials: bool,
    response_kind: ResponseKind,
}

impl HyperXhr {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::full())
    }

    /// The restricted variant used for cross-origin calls: no request or
    /// response headers, no credentials flag, text responses only.
    pub fn cross_domain() -> Self {
        Self::with_capabilities(CROSS_DOMAIN)
    }

    fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            shared: Arc::new(Mutex::new(Shared::default())),
            task: None,
            method: None,
            url: None,
            headers: Vec::new(),
            timeout: None,
            with_credentials: false,
            response_kind: ResponseKind::default(),
        }
    }

    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    fn expect_unsent_request(&self) -> Result<(), TransportError> {
        let shared = lock(&self.shared);
        if shared.ready_state != ReadyState::Opened || shared.sent {
            return Err(TransportError::InvalidState {
                state: shared.ready_state.name(),
                expected: ReadyState::Opened.name(),
            });
        }
        Ok(())
    }
}

impl Default for HyperXhr {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HyperXhr {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl LegacyTransport for HyperXhr {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn set_handler(&mut self, slot: HandlerSlot, handler: Option<RawHandler>) {
        let mut shared = lock(&self.shared);
        match handler {
            Some(h) => {
                shared.handlers.insert(slot, Arc::new(Mutex::new(h)));
            }
            None => {
                shared.handlers.remove(&slot);
            }
        }
    }

    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<(), TransportError> {
        if !is_async {
            return Err(TransportError::Unsupported("synchronous requests"));
        }
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| {
            TransportError::InvalidMethod {
                method: method.to_string(),
            }
        })?;
        let url = Url::parse(url).map_err(|_| TransportError::InvalidUrl {
            url: url.to_string(),
        })?;

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.method = Some(method);
        self.url = Some(url);
        self.headers.clear();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.sent = false;
            shared.reset_response();
            shared.ready_state = ReadyState::Opened;
            shared.generation
        };
        notify(&self.shared, generation, HandlerSlot::ReadyStateChange);
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        self.expect_unsent_request()?;
        let invalid = || TransportError::InvalidHeader {
            name: name.to_string(),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.headers.push((header_name, header_value));
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
    }

    fn set_with_credentials(&mut self, with_credentials: bool) {
        self.with_credentials = with_credentials;
    }

    fn set_response_kind(&mut self, kind: ResponseKind) {
        self.response_kind = kind;
    }

    fn send(&mut self, body: Option<BodyData>) -> Result<(), TransportError> {
        self.expect_unsent_request()?;
        let handle = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (method, url) = match (self.method.clone(), self.url.clone()) {
            (Some(method), Some(url)) => (method, url),
            _ => {
                return Err(TransportError::InvalidState {
                    state: ReadyState::Unsent.name(),
                    expected: ReadyState::Opened.name(),
                })
            }
        };

        // GET and HEAD never carry a payload.
        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            body
        };
        let (payload, content_type) = encode_body(body);
        let outgoing = Outgoing {
            method,
            url,
            headers: self.headers.clone(),
            body: payload,
            content_type,
        };

        let generation = {
            let mut shared = lock(&self.shared);
            shared.sent = true;
            shared.generation
        };

        tracing::debug!(
            method = %outgoing.method,
            url = %outgoing.url,
            timeout = ?self.timeout,
            "xhr send"
        );

        let shared = Arc::clone(&self.shared);
        let timeout = self.timeout;
        self.task = Some(handle.spawn(async move {
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, perform(outgoing)).await {
                    Ok(result) => result,
                    Err(_) => Err(XhrFailure::Timeout),
                },
                None => perform(outgoing).await,
            };
            finish(&shared, generation, result);
        }));
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let (in_flight, generation) = {
            let mut shared = lock(&self.shared);
            let in_flight = match shared.ready_state {
                ReadyState::Opened => shared.sent,
                ReadyState::HeadersReceived | ReadyState::Loading => true,
                ReadyState::Unsent | ReadyState::Done => false,
            };
            shared.generation += 1;
            shared.sent = false;
            shared.reset_response();
            if in_flight {
                shared.ready_state = ReadyState::Done;
            }
            (in_flight, shared.generation)
        };

        if in_flight {
            tracing::debug!("xhr aborted in flight");
            notify(&self.shared, generation, HandlerSlot::ReadyStateChange);
            notify(&self.shared, generation, HandlerSlot::Abort);
        }
        lock(&self.shared).ready_state = ReadyState::Unsent;
    }

    fn ready_state(&self) -> ReadyState {
        lock(&self.shared).ready_state
    }

    fn status(&self) -> u16 {
        lock(&self.shared).status
    }

    fn status_text(&self) -> String {
        lock(&self.shared).status_text.clone()
    }

    fn all_response_headers(&self) -> Option<String> {
        lock(&self.shared).raw_headers.clone()
    }

    fn response_url(&self) -> Option<String> {
        lock(&self.shared).response_url.clone()
    }

    fn response(&self) -> Option<BodyData> {
        let shared = lock(&self.shared);
        if shared.ready_state != ReadyState::Done {
            return None;
        }
        let body = shared.body.clone()?;
        Some(match self.response_kind {
            ResponseKind::Blob => BodyData::Blob(Blob::new(body, &shared.content_type)),
            ResponseKind::Text => BodyData::Text(String::from_utf8_lossy(&body).into()),
        })
    }
}

/// Creates a [`HyperXhr`] per call.
///
/// With the cross-domain fallback enabled, cross-origin calls get the
/// restricted [`HyperXhr::cross_domain`] variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperXhrFactory {
    cross_domain_fallback: bool,
}

impl HyperXhrFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cross_domain_fallback() -> Self {
        Self {
            cross_domain_fallback: true,
        }
    }
}

impl TransportFactory for HyperXhrFactory {
    fn create(&self, cross_origin: bool) -> Box<dyn LegacyTransport> {
        if cross_origin && self.cross_domain_fallback {
            Box::new(HyperXhr::cross_domain())
        } else {
            Box::new(HyperXhr::new())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Invoke the handler in `slot` outside the state lock, unless the
/// transport moved on to a newer generation.
fn notify(shared: &Mutex<Shared>, generation: u64, slot: HandlerSlot) {
    let (handler, state) = {
        let shared = lock(shared);
        if shared.generation != generation {
            return;
        }
        (shared.handlers.get(&slot).cloned(), shared.ready_state)
    };
    if let Some(handler) = handler {
        let mut guard = lock(&handler);
        let callback: &mut RawHandler = &mut guard;
        callback(state);
    }
}

/// Move to `state` and fire readystatechange. False once superseded.
fn advance(shared: &Mutex<Shared>, generation: u64, state: ReadyState) -> bool {
    {
        let mut shared = lock(shared);
        if shared.generation != generation {
            return false;
        }
        shared.ready_state = state;
    }
    notify(shared, generation, HandlerSlot::ReadyStateChange);
    true
}

fn finish(shared: &Mutex<Shared>, generation: u64, result: Result<Loaded, XhrFailure>) {
    let loaded = match result {
        Ok(loaded) => loaded,
        Err(failure) => {
            let slot = match failure {
                XhrFailure::Timeout => HandlerSlot::Timeout,
                _ => HandlerSlot::Error,
            };
            tracing::debug!(error = %failure, "xhr failed");
            if advance(shared, generation, ReadyState::Done) {
                notify(shared, generation, slot);
            }
            return;
        }
    };

    {
        let mut state = lock(shared);
        if state.generation != generation {
            return;
        }
        state.status = loaded.status.as_u16();
        state.status_text = loaded
            .status
            .canonical_reason()
            .unwrap_or_default()
            .to_string();
        state.raw_headers = Some(loaded.raw_headers);
        state.response_url = Some(strip_fragment(&loaded.url));
        state.content_type = loaded.content_type;
    }
    if !advance(shared, generation, ReadyState::HeadersReceived) {
        return;
    }
    if !advance(shared, generation, ReadyState::Loading) {
        return;
    }
    {
        let mut state = lock(shared);
        if state.generation != generation {
            return;
        }
        state.body = Some(loaded.body);
    }
    if advance(shared, generation, ReadyState::Done) {
        tracing::debug!(url = %loaded.url, status = loaded.status.as_u16(), "xhr loaded");
        notify(shared, generation, HandlerSlot::Load);
    }
}

fn encode_body(body: Option<BodyData>) -> (Bytes, Option<String>) {
    match body {
        None => (Bytes::new(), None),
        Some(BodyData::Text(text)) => (Bytes::copy_from_slice(text.as_bytes()), None),
        Some(BodyData::Buffer(bytes)) => (bytes, None),
        Some(BodyData::Blob(blob)) => (blob.bytes(), None),
        Some(BodyData::Form(form)) => {
            let multipart = form.to_multipart();
            (multipart.body, Some(multipart.content_type))
        }
    }
}

/// Run the request, following redirects up to [`REDIRECT_LIMIT`].
async fn perform(mut outgoing: Outgoing) -> Result<Loaded, XhrFailure> {
    for _ in 0..=REDIRECT_LIMIT {
        let response = send_once(&outgoing).await?;
        let status = response.status();

        let location = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| outgoing.url.join(loc).ok())
        } else {
            None
        };

        if let Some(next) = location {
            tracing::debug!(
                from = %outgoing.url,
                to = %next,
                status = status.as_u16(),
                "xhr redirect"
            );
            let downgrade = status == StatusCode::SEE_OTHER
                || (outgoing.method == Method::POST
                    && (status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND));
            if downgrade {
                outgoing.method = Method::GET;
                outgoing.body = Bytes::new();
                outgoing.content_type = None;
                outgoing.headers.retain(|(name, _)| *name != CONTENT_TYPE);
            }
            outgoing.url = next;
            continue;
        }

        let raw_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                format!("{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()))
            })
            .collect::<String>();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.into_body().collect().await?.to_bytes();

        return Ok(Loaded {
            status,
            raw_headers,
            content_type,
            url: outgoing.url,
            body,
        });
    }
    Err(XhrFailure::TooManyRedirects)
}

async fn send_once(
    outgoing: &Outgoing,
) -> Result<http::Response<hyper::body::Incoming>, XhrFailure> {
    let url = &outgoing.url;
    if url.scheme() != "http" {
        return Err(XhrFailure::Url(url.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| XhrFailure::Url(url.to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| XhrFailure::Url(url.to_string()))?;

    let stream = TcpStream::connect((host, port)).await?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "xhr connection closed with error");
        }
    });

    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let target = &url[url::Position::BeforePath..url::Position::AfterQuery];

    let mut builder = http::Request::builder()
        .method(outgoing.method.clone())
        .uri(target)
        .header(HOST, authority);
    let mut has_content_type = false;
    for (name, value) in &outgoing.headers {
        has_content_type |= *name == CONTENT_TYPE;
        builder = builder.header(name, value);
    }
    if let (false, Some(content_type)) = (has_content_type, &outgoing.content_type) {
        builder = builder.header(CONTENT_TYPE, content_type.as_str());
    }
    let request = builder.body(Full::new(outgoing.body.clone()))?;

    Ok(sender.send_request(request).await?)
}
