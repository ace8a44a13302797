//! HTTP request client with retry, timeout, auth injection, and
//! best-effort lifecycle observers.

mod error;
mod hooks;
mod http;

pub use error::ApiError;
pub use hooks::{RequestContext, RequestHook, ResponseContext};
pub use http::{ApiClient, RequestBody, RequestOptions};
