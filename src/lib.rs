//! # xhrfetch
//!
//! The Fetch API (`fetch`, `Headers`, `Request`, `Response`, `Body`) layered
//! over an XMLHttpRequest-style legacy transport.
//!
//! ## Features
//!
//! - **Headers**: case-insensitive, comma-joined, original-case aware
//! - **Bodies**: text, Blob, bytes, FormData and URL search params with
//!   single-consumption reads
//! - **Transport adapter**: one `on(event, handler)` surface over transports
//!   with or without `onload`
//! - **CORS gate**: `same-origin` blocking and opaque `no-cors` responses
//! - **hyper transport**: [`transport::HyperXhr`] speaks HTTP/1.1 on tokio
//!
//! The `json` cargo feature (on by default) enables `BodyInit::json`, which
//! serializes a value into a request or response body. Reading a body as
//! JSON is always available.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use xhrfetch::{FetchClient, RequestInit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xhrfetch::FetchError> {
//!     let client = FetchClient::builder()
//!         .location("http://localhost:8080/")
//!         .build()?;
//!     let response = client
//!         .fetch("/api", Some(RequestInit::new().method("post").body("hi")))
//!         .await?;
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Errors, origins and the fetch state machine
//! - [`http`] - Headers, bodies, requests and responses
//! - [`transport`] - The legacy transport trait, adapter and hyper transport
//! - [`client`] - The fetch orchestrator

pub mod base;
pub mod client;
pub mod http;
pub mod transport;

pub use base::{FetchError, TransportError};
pub use client::{FetchClient, FetchClientBuilder, FetchConfig};
pub use http::{
    Blob, Body, BodyData, BodyInit, FormData, Headers, HeadersInit, Request, RequestInit,
    RequestMode, Response, ResponseInit, ResponseType,
};
