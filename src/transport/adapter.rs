//! Uniform event surface over a legacy transport.
//!
//! The adapter installs its own raw callbacks into the transport and routes
//! them to handlers registered with [`TransportAdapter::on`]. Transports
//! without an `onload` slot are watched through `onreadystatechange` and
//! complete when the ready state reaches `Done`. At most one terminal event
//! is delivered: the first one to fire drops every other handler.

use crate::base::fetcherror::TransportError;
use crate::http::body::BodyData;
use crate::http::request::RequestCredentials;
use crate::transport::{
    Capabilities, HandlerSlot, LegacyTransport, RawHandler, ReadyState, ResponseKind,
    TransportEvent,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Handler for a uniform transport event.
pub type EventHandler = Box<dyn FnOnce(TransportEvent) + Send + Sync + 'static>;

type Registry = Arc<DashMap<TransportEvent, EventHandler>>;

/// Per-call settings applied after `open`.
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    pub credentials: RequestCredentials,
    pub timeout: Option<Duration>,
    pub response_kind: ResponseKind,
}

pub struct TransportAdapter {
    transport: Box<dyn LegacyTransport>,
    capabilities: Capabilities,
    events: Registry,
}

impl TransportAdapter {
    pub fn new(mut transport: Box<dyn LegacyTransport>) -> Self {
        let capabilities = transport.capabilities();
        let events: Registry = Arc::new(DashMap::new());

        if capabilities.onload {
            transport.set_handler(
                HandlerSlot::Load,
                Some(forwarder(&events, TransportEvent::Load)),
            );
        } else {
            let registry = Arc::clone(&events);
            transport.set_handler(
                HandlerSlot::ReadyStateChange,
                Some(Box::new(move |state| {
                    if state == ReadyState::Done {
                        fire(&registry, TransportEvent::Load);
                    }
                })),
            );
        }
        transport.set_handler(
            HandlerSlot::Error,
            Some(forwarder(&events, TransportEvent::Error)),
        );
        transport.set_handler(
            HandlerSlot::Timeout,
            Some(forwarder(&events, TransportEvent::Timeout)),
        );
        transport.set_handler(
            HandlerSlot::Abort,
            Some(forwarder(&events, TransportEvent::Abort)),
        );

        Self {
            transport,
            capabilities,
            events,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Register the handler for `event`, replacing any previous one.
    pub fn on<F>(&self, event: TransportEvent, handler: F)
    where
        F: FnOnce(TransportEvent) + Send + Sync + 'static,
    {
        self.events.insert(event, Box::new(handler));
    }

    pub fn open(&mut self, method: &str, url: &str) -> Result<(), TransportError> {
        self.transport.open(method, url, true)
    }

    /// Apply timeout, credentials and response kind where supported.
    pub fn configure(&mut self, options: &AdapterOptions) {
        if let Some(timeout) = options.timeout {
            if self.capabilities.timeout {
                self.transport.set_timeout(timeout);
            } else {
                tracing::debug!(?timeout, "transport has no timeout support, ignoring");
            }
        }

        let with_credentials = match options.credentials {
            RequestCredentials::Include => Some(true),
            RequestCredentials::Omit => Some(false),
            RequestCredentials::SameOrigin => None,
        };
        if let Some(flag) = with_credentials {
            if self.capabilities.with_credentials {
                self.transport.set_with_credentials(flag);
            } else {
                tracing::debug!(
                    with_credentials = flag,
                    "transport has no credentials flag, ignoring"
                );
            }
        }

        let kind = if self.capabilities.binary_response {
            options.response_kind
        } else {
            ResponseKind::Text
        };
        self.transport.set_response_kind(kind);
    }

    pub fn supports_request_headers(&self) -> bool {
        self.capabilities.request_headers
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        if !self.capabilities.request_headers {
            tracing::debug!(name, "transport cannot set request headers, dropping");
            return Ok(());
        }
        self.transport.set_request_header(name, value)
    }

    pub fn send(&mut self, body: Option<BodyData>) -> Result<(), TransportError> {
        self.transport.send(body)
    }

    /// Detach every handler, then abort the transport.
    pub fn abort(&mut self) {
        self.detach();
        self.transport.abort();
    }

    /// Clear registered handlers and the transport's raw slots.
    pub fn detach(&mut self) {
        self.events.clear();
        for slot in HandlerSlot::ALL {
            self.transport.set_handler(slot, None);
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.transport.ready_state()
    }

    pub fn status(&self) -> u16 {
        self.transport.status()
    }

    pub fn status_text(&self) -> String {
        self.transport.status_text()
    }

    pub fn raw_headers(&self) -> Option<String> {
        if !self.capabilities.response_headers {
            return None;
        }
        self.transport.all_response_headers()
    }

    pub fn response_url(&self) -> Option<String> {
        if !self.capabilities.response_url {
            return None;
        }
        self.transport.response_url().filter(|url| !url.is_empty())
    }

    pub fn response(&self) -> Option<BodyData> {
        self.transport.response()
    }
}

fn forwarder(events: &Registry, event: TransportEvent) -> RawHandler {
    let registry = Arc::clone(events);
    Box::new(move |_| fire(&registry, event))
}

fn fire(events: &DashMap<TransportEvent, EventHandler>, event: TransportEvent) {
    let handler = events.remove(&event).map(|(_, handler)| handler);
    events.clear();
    if let Some(handler) = handler {
        handler(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Slots {
        handlers: Vec<(HandlerSlot, RawHandler)>,
    }

    /// Minimal transport that exposes its slots to the test.
    struct SlotTransport {
        capabilities: Capabilities,
        slots: Arc<Mutex<Slots>>,
    }

    impl LegacyTransport for SlotTransport {
        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }
        fn set_handler(&mut self, slot: HandlerSlot, handler: Option<RawHandler>) {
            let mut slots = self.slots.lock().unwrap();
            slots.handlers.retain(|(s, _)| *s != slot);
            if let Some(h) = handler {
                slots.handlers.push((slot, h));
            }
        }
        fn open(&mut self, _: &str, _: &str, _: bool) -> Result<(), TransportError> {
            Ok(())
        }
        fn send(&mut self, _: Option<BodyData>) -> Result<(), TransportError> {
            Ok(())
        }
        fn abort(&mut self) {}
        fn ready_state(&self) -> ReadyState {
            ReadyState::Done
        }
        fn status(&self) -> u16 {
            200
        }
        fn status_text(&self) -> String {
            "OK".into()
        }
        fn response(&self) -> Option<BodyData> {
            None
        }
    }

    fn trigger(slots: &Arc<Mutex<Slots>>, slot: HandlerSlot, state: ReadyState) {
        let mut slots = slots.lock().unwrap();
        if let Some((_, h)) = slots.handlers.iter_mut().find(|(s, _)| *s == slot) {
            h(state);
        }
    }

    fn adapter(capabilities: Capabilities) -> (TransportAdapter, Arc<Mutex<Slots>>) {
        let slots = Arc::new(Mutex::new(Slots::default()));
        let transport = SlotTransport {
            capabilities,
            slots: Arc::clone(&slots),
        };
        (TransportAdapter::new(Box::new(transport)), slots)
    }

    fn record(adapter: &TransportAdapter) -> Arc<Mutex<Vec<TransportEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for event in TransportEvent::ALL {
            let seen = Arc::clone(&seen);
            adapter.on(event, move |e| seen.lock().unwrap().push(e));
        }
        seen
    }

    #[test]
    fn test_onload_transport() {
        let (adapter, slots) = adapter(Capabilities::full());
        let seen = record(&adapter);
        trigger(&slots, HandlerSlot::Load, ReadyState::Done);
        assert_eq!(*seen.lock().unwrap(), vec![TransportEvent::Load]);
    }

    #[test]
    fn test_readystate_transport_completes_on_done() {
        let (adapter, slots) = adapter(Capabilities::minimal());
        let seen = record(&adapter);
        trigger(&slots, HandlerSlot::ReadyStateChange, ReadyState::Opened);
        trigger(&slots, HandlerSlot::ReadyStateChange, ReadyState::Loading);
        assert!(seen.lock().unwrap().is_empty());
        trigger(&slots, HandlerSlot::ReadyStateChange, ReadyState::Done);
        assert_eq!(*seen.lock().unwrap(), vec![TransportEvent::Load]);
    }

    #[test]
    fn test_only_first_terminal_event_delivered() {
        let (adapter, slots) = adapter(Capabilities::full());
        let seen = record(&adapter);
        trigger(&slots, HandlerSlot::Timeout, ReadyState::Done);
        trigger(&slots, HandlerSlot::Load, ReadyState::Done);
        trigger(&slots, HandlerSlot::Abort, ReadyState::Unsent);
        assert_eq!(*seen.lock().unwrap(), vec![TransportEvent::Timeout]);
    }

    #[test]
    fn test_detach_clears_raw_slots() {
        let (mut adapter, slots) = adapter(Capabilities::full());
        let _seen = record(&adapter);
        assert_eq!(slots.lock().unwrap().handlers.len(), 4);
        adapter.abort();
        assert!(slots.lock().unwrap().handlers.is_empty());
    }

    #[test]
    fn test_capability_gated_accessors() {
        let (adapter, _) = adapter(Capabilities::minimal());
        assert!(adapter.raw_headers().is_none());
        assert!(adapter.response_url().is_none());
        assert!(!adapter.supports_request_headers());
    }
}
