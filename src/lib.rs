//! Snare Core Library
//!
//! An HTTP request engine for scraping: a [`Session`] holds layered options,
//! a cookie jar and hooks, and turns each `request()` call into a
//! [`Document`] by driving a [`Transport`] through redirects and retries.
//!
//! # Architecture
//!
//! - [`config`] - Typed option store with one-shot request options
//! - [`cookies`] - Domain-aware cookie jar and Netscape cookie files
//! - [`transport`] - Network I/O over reqwest with streaming bodies
//! - [`hooks`] - Retry and request/response extension points
//! - [`engine`] - The request state machine behind [`Session`]
//! - [`document`] - Materialized responses
//! - [`session`] - Serializable session snapshots
//!
//! # Example
//!
//! ```no_run
//! use snare_core::{ConfigOption, Session};
//!
//! # async fn run() -> Result<(), snare_core::Error> {
//! let mut session = Session::new();
//! session.setup([ConfigOption::FollowLocation(true)]);
//! let doc = session.go("https://example.com/").await?;
//! println!("{} {}", doc.status, doc.unicode_body()?);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cookies;
pub mod document;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod proxy;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod test_support;
pub mod transport;
pub mod user_agent;

// Re-export commonly used types
pub use config::{
    Config, ConfigOption, DocumentType, Headers, HttpMethod, MultipartField, MultipartValue,
    OptionKey, PostData, ProxyType,
};
pub use cookies::{Cookie, CookieJar, CookieManager};
pub use document::{Body, Document};
pub use engine::Session;
pub use error::{Error, NetworkFailure, TimeoutPhase};
pub use hooks::{HookRegistry, RetryAction, RetryState, StatusRetry};
pub use proxy::{ProxyList, ProxyServer, ProxySource, ProxyStrategy};
pub use session::{SessionSnapshot, SessionState};
pub use transport::{HttpTransport, Request, RequestBody, Transport};
