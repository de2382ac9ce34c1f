//! Base types and error handling.
//!
//! - [`FetchError`]: every failure kind surfaced by the crate
//! - [`FetchState`]: lifecycle of one fetch call
//! - [`Origin`]: origin tuple used by the cross-origin gate

pub mod fetcherror;
pub mod fetchstate;
pub mod origin;

pub use fetcherror::{FetchError, TransportError};
pub use fetchstate::FetchState;
pub use origin::Origin;

#[cfg(test)]
mod tests;
