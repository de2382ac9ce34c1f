use thiserror::Error;

/// Errors raised by the legacy transport while it is being configured or sent.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TransportError {
    #[error("Transport is in state {state}, expected {expected}")]
    InvalidState {
        state: &'static str,
        expected: &'static str,
    },
    #[error("Transport rejected header {name}")]
    InvalidHeader { name: String },
    #[error("Transport rejected method {method}")]
    InvalidMethod { method: String },
    #[error("Transport cannot open {url:?}")]
    InvalidUrl { url: String },
    #[error("Transport requires a running tokio runtime")]
    NoRuntime,
    #[error("Transport does not support {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum FetchError {
    // Headers
    #[error("Invalid header name: {name:?}")]
    InvalidHeaderName { name: String },
    #[error("Invalid header value for {name:?}")]
    InvalidHeaderValue { name: String },

    // Body
    #[error("Already read")]
    AlreadyConsumed,
    #[error("Could not read {from} body as {to}")]
    UnsupportedConversion {
        from: &'static str,
        to: &'static str,
    },
    #[error("JSON parse error: {message}")]
    JsonParse { message: String },

    // Request / Response construction
    #[error("Request with {method} method cannot have body")]
    BodyNotAllowed { method: String },
    #[error("Request cannot be constructed from a URL that includes credentials: {url}")]
    CredentialsInUrl { url: String },
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("The response status provided ({status}) is not valid")]
    InvalidStatus { status: u16 },

    // Fetch
    #[error("Request mode is \"same-origin\" but the URL's origin is not same as the request origin: {url}")]
    CrossOriginBlocked { url: String },
    #[error("Request {url} failed")]
    NetworkFailure { url: String },
    #[error("Request {url} timeout")]
    NetworkTimeout { url: String },
    #[error("Request {url} aborted")]
    NetworkAborted { url: String },
    #[error("Request {url} {reason}")]
    InvalidResponse { url: String, reason: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FetchError {
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures reported by the transport after dispatch.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkFailure { .. }
                | FetchError::NetworkTimeout { .. }
                | FetchError::NetworkAborted { .. }
        )
    }

    /// The request URL this error is tagged with, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::CredentialsInUrl { url }
            | FetchError::InvalidUrl { url, .. }
            | FetchError::CrossOriginBlocked { url }
            | FetchError::NetworkFailure { url }
            | FetchError::NetworkTimeout { url }
            | FetchError::NetworkAborted { url }
            | FetchError::InvalidResponse { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::JsonParse {
            message: err.to_string(),
        }
    }
}
