//! Fetch client: the `fetch` entry point over a legacy transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use xhrfetch::{FetchClient, RequestInit};
//!
//! let client = FetchClient::builder()
//!     .location("http://localhost:8080/app/")
//!     .build()?;
//!
//! let resp = client.fetch("api/items", None).await?;
//! let items: Vec<String> = resp.json().await?;
//! ```

use crate::base::fetcherror::FetchError;
use crate::base::fetchstate::FetchState;
use crate::base::origin::{strip_fragment, Origin};
use crate::http::body::BodyInit;
use crate::http::headers::Headers;
use crate::http::request::{Request, RequestInit, RequestInput, RequestMode};
use crate::http::response::{Response, ResponseInit, ResponseType};
use crate::transport::{
    AdapterOptions, HyperXhrFactory, ResponseKind, TransportAdapter, TransportEvent,
    TransportFactory,
};
use futures::future::{self, BoxFuture, FutureExt};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub const DEFAULT_LOCATION: &str = "http://localhost/";

/// Client-wide settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Current location: the origin for cross-origin checks and the base
    /// for relative request URLs. Must be absolute.
    pub location: String,

    /// Transport timeout for requests that do not set their own.
    pub timeout_ms: Option<u64>,

    /// Preferred response representation when the transport offers a choice.
    pub response_kind: ResponseKind,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION.to_string(),
            timeout_ms: None,
            response_kind: ResponseKind::Blob,
        }
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("location", &self.location)
            .field("timeout_ms", &self.timeout_ms)
            .field("response_kind", &self.response_kind)
            .finish()
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Issues fetch calls, one transport per call.
///
/// Use [`FetchClient::builder()`] to configure a client.
#[derive(Clone)]
pub struct FetchClient {
    config: Arc<FetchConfig>,
    location: Url,
    origin: Origin,
    factory: Arc<dyn TransportFactory>,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("location", &self.location.as_str())
            .field("timeout_ms", &self.config.timeout_ms)
            .field("response_kind", &self.config.response_kind)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    /// A client at [`DEFAULT_LOCATION`] using [`HyperXhrFactory`].
    pub fn new() -> Result<Self, FetchError> {
        Self::builder().build()
    }

    pub fn builder() -> FetchClientBuilder {
        FetchClientBuilder::default()
    }

    fn from_parts(
        config: FetchConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, FetchError> {
        let location = Url::parse(&config.location)
            .map_err(|e| FetchError::invalid_url(config.location.as_str(), e))?;
        Ok(Self {
            origin: Origin::from_url(&location),
            location,
            config: Arc::new(config),
            factory,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Start a fetch.
    ///
    /// The request is built and the transport dispatched before this
    /// returns; the future settles when the transport reports its terminal
    /// event. Relative URLs resolve against the client location.
    pub fn fetch<'a>(
        &self,
        input: impl Into<RequestInput<'a>>,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        match Request::with_base(input, init.unwrap_or_default(), Some(&self.location)) {
            Ok(request) => self.send(request),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    /// Dispatch an already-built request.
    pub fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, FetchError>> {
        match self.dispatch(&request) {
            Ok(Dispatch::Opaque) => future::ready(Ok(Response::opaque())).boxed(),
            Ok(Dispatch::Pending(pending)) => pending.settle().boxed(),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    fn dispatch(&self, request: &Request) -> Result<Dispatch, FetchError> {
        let url = request.parsed_url();
        let cross_origin = self.origin.is_cross_origin(url);
        tracing::debug!(
            url = %url,
            method = %request.method(),
            mode = request.mode().as_str(),
            cross_origin,
            "fetch"
        );

        if cross_origin {
            match request.mode() {
                RequestMode::SameOrigin => {
                    return Err(FetchError::CrossOriginBlocked {
                        url: request.url().to_string(),
                    })
                }
                RequestMode::NoCors => {
                    tracing::debug!(url = %url, "no-cors cross-origin request, opaque response");
                    return Ok(Dispatch::Opaque);
                }
                RequestMode::Cors | RequestMode::Navigate => {}
            }
        }

        let mut adapter = TransportAdapter::new(self.factory.create(cross_origin));
        let (tx, events) = mpsc::unbounded_channel();
        for event in TransportEvent::ALL {
            let tx = tx.clone();
            adapter.on(event, move |fired| {
                let _ = tx.send(fired);
            });
        }
        drop(tx);

        let options = AdapterOptions {
            credentials: request.credentials(),
            timeout: request.timeout().or_else(|| self.config.timeout()),
            response_kind: self.config.response_kind,
        };
        if let Err(err) = start(&mut adapter, request, &options) {
            tracing::debug!(url = %url, error = %err, "fetch dispatch failed");
            adapter.abort();
            return Err(err);
        }

        tracing::debug!(url = %url, state = ?FetchState::Dispatched, "fetch state");
        Ok(Dispatch::Pending(Pending {
            adapter,
            events,
            url: url.clone(),
            cross_origin,
        }))
    }
}

enum Dispatch {
    Opaque,
    Pending(Pending),
}

/// A dispatched call waiting for its terminal transport event.
struct Pending {
    adapter: TransportAdapter,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    url: Url,
    cross_origin: bool,
}

impl Pending {
    async fn settle(mut self) -> Result<Response, FetchError> {
        // Handlers dropped without firing means the transport went away.
        let event = self.events.recv().await.unwrap_or(TransportEvent::Abort);
        let state = FetchState::after(event);
        tracing::debug!(url = %self.url, event = ?event, state = ?state, "fetch state");

        let result = match state.rejection(self.url.as_str()) {
            Some(err) => Err(err),
            None => self.complete(),
        };
        self.adapter.detach();
        result
    }

    fn complete(&self) -> Result<Response, FetchError> {
        let headers = parse_raw_headers(self.adapter.raw_headers().as_deref().unwrap_or_default());

        let status = match self.adapter.status() {
            0 => 200,
            status => status,
        };
        let request_url = strip_fragment(&self.url);
        let url = self
            .adapter
            .response_url()
            .or_else(|| headers.get("X-Request-URL").map(str::to_string))
            .unwrap_or_else(|| request_url.clone());
        let response_type = if self.cross_origin {
            ResponseType::Cors
        } else {
            ResponseType::Basic
        };

        let mut init = ResponseInit::new()
            .status(status)
            .headers(headers)
            .response_type(response_type)
            .redirected(url != request_url)
            .url(url);
        let status_text = self.adapter.status_text();
        if !status_text.is_empty() {
            init = init.status_text(status_text);
        }

        let body = self.adapter.response().map(BodyInit::Data);
        Response::new(body, init).map_err(|err| FetchError::InvalidResponse {
            url: self.url.to_string(),
            reason: err.to_string(),
        })
    }
}

fn start(
    adapter: &mut TransportAdapter,
    request: &Request,
    options: &AdapterOptions,
) -> Result<(), FetchError> {
    adapter.open(request.method(), request.url())?;
    adapter.configure(options);
    for (name, value) in request.headers().wire_entries() {
        adapter.set_request_header(name, value)?;
    }
    adapter.send(request.body().data().cloned())?;
    Ok(())
}

/// Parse a CRLF-delimited response header blob.
///
/// Folded continuation lines are joined to the previous line with a single
/// space. Lines without a `:` or with an empty name are skipped.
pub fn parse_raw_headers(raw: &str) -> Headers {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match lines.last_mut() {
            Some(previous) if line.starts_with([' ', '\t']) => {
                previous.push(' ');
                previous.push_str(line.trim_start_matches([' ', '\t']));
            }
            _ => lines.push(line.to_string()),
        }
    }

    let mut headers = Headers::new();
    for line in &lines {
        let Some((name, value)) = line.split_once(':') else {
            if !line.trim().is_empty() {
                tracing::warn!(line = %line, "dropping response header line without ':'");
            }
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if let Err(err) = headers.append(name, value.trim()) {
            tracing::warn!(error = %err, "dropping malformed response header");
        }
    }
    headers
}

/// Builder for a [`FetchClient`].
#[derive(Default)]
pub struct FetchClientBuilder {
    config: FetchConfig,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl FetchClientBuilder {
    /// Set the current location (must be absolute).
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    /// Set the default transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.config.response_kind = kind;
        self
    }

    /// Replace the transport factory (defaults to [`HyperXhrFactory`]).
    pub fn transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Replace every setting made so far.
    pub fn config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails when the location is not an absolute URL.
    pub fn build(self) -> Result<FetchClient, FetchError> {
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(HyperXhrFactory::new()));
        FetchClient::from_parts(self.config, factory)
    }
}
