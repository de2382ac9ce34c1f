use crate::base::fetcherror::FetchError;
use crate::transport::TransportEvent;

/// The state of a single fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    /// The request has been built but not handed to a transport.
    #[default]
    Idle,

    /// The transport was opened and sent; waiting for its terminal event.
    Dispatched,

    /// The transport reported `load` and a Response was produced.
    Completed,

    /// The transport reported `error`.
    Failed,

    /// The transport reported `timeout`.
    TimedOut,

    /// The transport reported `abort`.
    Aborted,
}

impl FetchState {
    /// The state reached from `Dispatched` when `event` fires.
    pub fn after(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Load => FetchState::Completed,
            TransportEvent::Error => FetchState::Failed,
            TransportEvent::Timeout => FetchState::TimedOut,
            TransportEvent::Abort => FetchState::Aborted,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, FetchState::Idle | FetchState::Dispatched)
    }

    /// The error a failed call settles with, tagged with the request URL.
    /// `None` for every state that does not reject.
    pub fn rejection(self, url: &str) -> Option<FetchError> {
        let url = url.to_string();
        match self {
            FetchState::Failed => Some(FetchError::NetworkFailure { url }),
            FetchState::TimedOut => Some(FetchError::NetworkTimeout { url }),
            FetchState::Aborted => Some(FetchError::NetworkAborted { url }),
            FetchState::Idle | FetchState::Dispatched | FetchState::Completed => None,
        }
    }
}
