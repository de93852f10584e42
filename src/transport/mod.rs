//! Network I/O: one request descriptor in, one document (or classified error)
//! out.
//!
//! [`HttpTransport`] is the production implementation. The engine only sees
//! the [`Transport`] trait, so tests can substitute a scripted transport.

mod client;
mod error_mapping;
mod request;

use async_trait::async_trait;

use crate::config::HttpMethod;
use crate::document::Document;
use crate::error::Error;

pub use client::HttpTransport;
pub use request::{ProxySettings, Request, RequestBody};

/// Performs requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes `request` and materializes the response.
    ///
    /// Every fault is reported as an [`Error`]; no client or IO error type
    /// escapes.
    async fn dispatch(&self, request: &Request) -> Result<Document, Error>;

    /// Clears request-scoped state. Connection pools survive.
    fn reset(&self);
}

/// What the last dispatch sent, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLog {
    pub method: HttpMethod,
    pub url: String,
    /// Proxy address, when one was used.
    pub proxy: Option<String>,
}
