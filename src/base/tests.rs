use crate::base::fetcherror::{FetchError, TransportError};

#[test]
fn test_network_messages_name_url_and_reason() {
    let url = "http://example.com/api".to_string();

    let failed = FetchError::NetworkFailure { url: url.clone() };
    assert_eq!(failed.to_string(), "Request http://example.com/api failed");

    let timeout = FetchError::NetworkTimeout { url: url.clone() };
    assert_eq!(timeout.to_string(), "Request http://example.com/api timeout");

    let aborted = FetchError::NetworkAborted { url };
    assert_eq!(aborted.to_string(), "Request http://example.com/api aborted");
}

#[test]
fn test_is_network() {
    assert!(FetchError::NetworkTimeout { url: "u".into() }.is_network());
    assert!(!FetchError::AlreadyConsumed.is_network());
    assert!(!FetchError::CrossOriginBlocked { url: "u".into() }.is_network());
}

#[test]
fn test_url_accessor() {
    let err = FetchError::CrossOriginBlocked {
        url: "http://other.example/".into(),
    };
    assert_eq!(err.url(), Some("http://other.example/"));
    assert_eq!(FetchError::InvalidStatus { status: 99 }.url(), None);
}

#[test]
fn test_transport_error_converts() {
    let err: FetchError = TransportError::NoRuntime.into();
    assert!(matches!(err, FetchError::Transport(TransportError::NoRuntime)));
    assert_eq!(err.to_string(), "Transport requires a running tokio runtime");
}

#[test]
fn test_json_error_converts() {
    let parse = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
    let err: FetchError = parse.into();
    assert!(matches!(err, FetchError::JsonParse { .. }));
}
