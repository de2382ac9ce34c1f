//! Scripted legacy transport for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xhrfetch::transport::{
    Capabilities, HandlerSlot, LegacyTransport, RawHandler, ReadyState, ResponseKind,
    TransportFactory,
};
use xhrfetch::{BodyData, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open {
        method: String,
        url: String,
        is_async: bool,
    },
    Header(String, String),
    Timeout(Duration),
    WithCredentials(bool),
    ResponseKind(ResponseKind),
    Send(Option<BodyData>),
    Abort,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    handlers: HashMap<HandlerSlot, RawHandler>,
    ready_state: ReadyState,
    status: u16,
    status_text: String,
    raw_headers: Option<String>,
    response_url: Option<String>,
    response: Option<BodyData>,
    reject_header: Option<String>,
    fire_on_send: Option<HandlerSlot>,
    created: Vec<bool>,
}

/// Test-side view of every transport a [`MockFactory`] creates.
#[derive(Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn opened(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, Call::Open { .. }))
    }

    /// `cross_origin` flags passed to the factory, one per created transport.
    pub fn created(&self) -> Vec<bool> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn headers_sent(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Header(n, v) => Some((n, v)),
                _ => None,
            })
            .collect()
    }

    pub fn installed_slots(&self) -> Vec<HandlerSlot> {
        let state = self.state.lock().unwrap();
        HandlerSlot::ALL
            .into_iter()
            .filter(|s| state.handlers.contains_key(s))
            .collect()
    }

    pub fn reject_header(&self, name: &str) {
        self.state.lock().unwrap().reject_header = Some(name.to_string());
    }

    /// Fire `slot` synchronously from inside `send`.
    pub fn fire_on_send(&self, slot: HandlerSlot) {
        self.state.lock().unwrap().fire_on_send = Some(slot);
    }

    /// Store a completed response without notifying anyone.
    pub fn respond(
        &self,
        status: u16,
        status_text: &str,
        raw_headers: &str,
        body: Option<BodyData>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.status = status;
        state.status_text = status_text.to_string();
        state.raw_headers = Some(raw_headers.to_string());
        state.response = body;
        state.ready_state = ReadyState::Done;
    }

    pub fn set_response_url(&self, url: &str) {
        self.state.lock().unwrap().response_url = Some(url.to_string());
    }

    /// Set the ready state and fire `slot` with it.
    pub fn fire_with(&self, slot: HandlerSlot, ready_state: ReadyState) {
        self.state.lock().unwrap().ready_state = ready_state;
        fire(&self.state, slot);
    }

    pub fn fire(&self, slot: HandlerSlot) {
        fire(&self.state, slot);
    }
}

fn fire(state: &Arc<Mutex<MockState>>, slot: HandlerSlot) {
    let (handler, ready_state) = {
        let mut state = state.lock().unwrap();
        (state.handlers.remove(&slot), state.ready_state)
    };
    if let Some(mut handler) = handler {
        handler(ready_state);
        state
            .lock()
            .unwrap()
            .handlers
            .entry(slot)
            .or_insert(handler);
    }
}

pub struct MockTransport {
    capabilities: Capabilities,
    state: Arc<Mutex<MockState>>,
}

impl LegacyTransport for MockTransport {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn set_handler(&mut self, slot: HandlerSlot, handler: Option<RawHandler>) {
        let mut state = self.state.lock().unwrap();
        match handler {
            Some(h) => {
                state.handlers.insert(slot, h);
            }
            None => {
                state.handlers.remove(&slot);
            }
        }
    }

    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Open {
            method: method.to_string(),
            url: url.to_string(),
            is_async,
        });
        state.ready_state = ReadyState::Opened;
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_header.as_deref() == Some(name) {
            return Err(TransportError::InvalidHeader {
                name: name.to_string(),
            });
        }
        state
            .calls
            .push(Call::Header(name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.state.lock().unwrap().calls.push(Call::Timeout(timeout));
    }

    fn set_with_credentials(&mut self, with_credentials: bool) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::WithCredentials(with_credentials));
    }

    fn set_response_kind(&mut self, kind: ResponseKind) {
        self.state.lock().unwrap().calls.push(Call::ResponseKind(kind));
    }

    fn send(&mut self, body: Option<BodyData>) -> Result<(), TransportError> {
        let slot = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Send(body));
            state.fire_on_send
        };
        if let Some(slot) = slot {
            fire(&self.state, slot);
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.state.lock().unwrap().calls.push(Call::Abort);
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().unwrap().ready_state
    }

    fn status(&self) -> u16 {
        self.state.lock().unwrap().status
    }

    fn status_text(&self) -> String {
        self.state.lock().unwrap().status_text.clone()
    }

    fn all_response_headers(&self) -> Option<String> {
        self.state.lock().unwrap().raw_headers.clone()
    }

    fn response_url(&self) -> Option<String> {
        self.state.lock().unwrap().response_url.clone()
    }

    fn response(&self) -> Option<BodyData> {
        self.state.lock().unwrap().response.clone()
    }
}

/// Hands out [`MockTransport`]s that all report into one [`MockHandle`].
pub struct MockFactory {
    capabilities: Capabilities,
    handle: MockHandle,
}

impl MockFactory {
    pub fn new(capabilities: Capabilities) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                capabilities,
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, cross_origin: bool) -> Box<dyn LegacyTransport> {
        self.handle.state.lock().unwrap().created.push(cross_origin);
        Box::new(MockTransport {
            capabilities: self.capabilities,
            state: Arc::clone(&self.handle.state),
        })
    }
}

pub fn transport(capabilities: Capabilities) -> (Box<dyn LegacyTransport>, MockHandle) {
    let (factory, handle) = MockFactory::new(capabilities);
    (factory.create(false), handle)
}
