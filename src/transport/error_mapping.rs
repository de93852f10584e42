//! Translation of client faults into [`Error`].

use crate::error::{Error, NetworkFailure, TimeoutPhase};

/// Maps a failure to send the request or receive the response head.
pub(crate) fn map_send_error(url: &str, error: reqwest::Error, via_proxy: bool) -> Error {
    if error.is_timeout() {
        let phase = if error.is_connect() {
            TimeoutPhase::Connect
        } else {
            TimeoutPhase::Read
        };
        return Error::timeout(url, phase);
    }
    if error.is_builder() {
        return Error::invalid_url(url, &error);
    }
    let kind = if is_tls_error(&error) {
        NetworkFailure::Tls
    } else if error.is_connect() && via_proxy {
        NetworkFailure::Proxy
    } else if error.is_connect() {
        NetworkFailure::Connect
    } else {
        NetworkFailure::Protocol
    };
    Error::network(url, kind, error)
}

/// Maps a failure while streaming the body.
pub(crate) fn map_body_error(url: &str, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        return Error::timeout(url, TimeoutPhase::Read);
    }
    Error::network(url, NetworkFailure::Protocol, error)
}

/// TLS failures only surface in the error text.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let mut text = error.to_string().to_lowercase();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        text.push(' ');
        text.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    text.contains("certificate")
        || text.contains("tls")
        || text.contains("ssl")
        || text.contains("handshake")
}
