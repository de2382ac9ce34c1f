pub mod blob;
pub mod body;
pub mod formdata;
pub mod headers;
pub mod request;
pub mod response;

// Re-exports for convenience
pub use blob::Blob;
pub use body::{Body, BodyData, BodyInit};
pub use formdata::{FormData, FormValue};
pub use headers::{Headers, HeadersInit};
pub use request::{
    Request, RequestCredentials, RequestInit, RequestInput, RequestMode, RequestRedirect,
};
pub use response::{Response, ResponseInit, ResponseType};
