//! The legacy request/transport primitive and its adapter.
//!
//! [`LegacyTransport`] is the XMLHttpRequest-shaped collaborator: raw
//! callback slots, `open`/`send`/`abort`, and a response read back through
//! status, status text, a CRLF header blob and a body. Implementations vary
//! in what they support, which they advertise via [`Capabilities`].
//! [`TransportAdapter`] turns any of them into one `on(event, handler)`
//! surface.

pub mod adapter;
pub mod xhr;

pub use adapter::{AdapterOptions, TransportAdapter};
pub use xhr::{HyperXhr, HyperXhrFactory};

use crate::base::fetcherror::TransportError;
use crate::http::body::BodyData;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw callback installed into a transport slot. Receives the ready state
/// at the time of the notification.
pub type RawHandler = Box<dyn FnMut(ReadyState) + Send + 'static>;

/// The callback slots a legacy transport may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerSlot {
    Load,
    Error,
    Timeout,
    Abort,
    ReadyStateChange,
}

impl HandlerSlot {
    pub const ALL: [HandlerSlot; 5] = [
        HandlerSlot::Load,
        HandlerSlot::Error,
        HandlerSlot::Timeout,
        HandlerSlot::Abort,
        HandlerSlot::ReadyStateChange,
    ];
}

/// XMLHttpRequest `readyState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

impl ReadyState {
    pub fn name(self) -> &'static str {
        match self {
            ReadyState::Unsent => "UNSENT",
            ReadyState::Opened => "OPENED",
            ReadyState::HeadersReceived => "HEADERS_RECEIVED",
            ReadyState::Loading => "LOADING",
            ReadyState::Done => "DONE",
        }
    }
}

/// Uniform terminal notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEvent {
    Load,
    Error,
    Timeout,
    Abort,
}

impl TransportEvent {
    pub const ALL: [TransportEvent; 4] = [
        TransportEvent::Load,
        TransportEvent::Error,
        TransportEvent::Timeout,
        TransportEvent::Abort,
    ];
}

/// Representation the transport should produce for the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Blob,
    Text,
}

/// Optional features of a transport variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Has an `onload` slot; otherwise completion is inferred from
    /// `onreadystatechange` reaching `Done`.
    pub onload: bool,
    pub with_credentials: bool,
    pub timeout: bool,
    pub request_headers: bool,
    pub response_headers: bool,
    pub response_url: bool,
    pub binary_response: bool,
}

impl Capabilities {
    /// Everything a level-2 XMLHttpRequest offers.
    pub const fn full() -> Self {
        Self {
            onload: true,
            with_credentials: true,
            timeout: true,
            request_headers: true,
            response_headers: true,
            response_url: true,
            binary_response: true,
        }
    }

    /// A readystatechange-only transport with no optional features.
    pub const fn minimal() -> Self {
        Self {
            onload: false,
            with_credentials: false,
            timeout: false,
            request_headers: false,
            response_headers: false,
            response_url: false,
            binary_response: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// An XMLHttpRequest-like request primitive.
///
/// Methods for optional features have no-op defaults; the adapter only calls
/// them when [`Capabilities`] says they exist.
pub trait LegacyTransport: Send {
    fn capabilities(&self) -> Capabilities;

    /// Install or clear the handler for `slot`.
    fn set_handler(&mut self, slot: HandlerSlot, handler: Option<RawHandler>);

    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<(), TransportError>;

    fn set_request_header(&mut self, _name: &str, _value: &str) -> Result<(), TransportError> {
        Ok(())
    }

    /// Zero disables the timeout.
    fn set_timeout(&mut self, _timeout: Duration) {}

    fn set_with_credentials(&mut self, _with_credentials: bool) {}

    fn set_response_kind(&mut self, _kind: ResponseKind) {}

    fn send(&mut self, body: Option<BodyData>) -> Result<(), TransportError>;

    fn abort(&mut self);

    fn ready_state(&self) -> ReadyState;

    fn status(&self) -> u16;

    fn status_text(&self) -> String;

    /// All response headers as one CRLF-delimited blob.
    fn all_response_headers(&self) -> Option<String> {
        None
    }

    fn response_url(&self) -> Option<String> {
        None
    }

    fn response(&self) -> Option<BodyData>;
}

/// Creates one transport per fetch call.
///
/// `cross_origin` lets a factory pick a restricted cross-domain variant.
pub trait TransportFactory: Send + Sync {
    fn create(&self, cross_origin: bool) -> Box<dyn LegacyTransport>;
}

impl<F> TransportFactory for F
where
    F: Fn(bool) -> Box<dyn LegacyTransport> + Send + Sync,
{
    fn create(&self, cross_origin: bool) -> Box<dyn LegacyTransport> {
        self(cross_origin)
    }
}
