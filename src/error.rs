//! Error types for the request engine.
//!
//! Every fault that crosses the transport boundary is re-classified into one
//! of these variants. Callers never see reqwest or IO error types directly
//! except as the `source()` of a variant.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which phase of an exchange exceeded its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// DNS resolution plus TCP/TLS connect.
    Connect,
    /// Gap between two successive body chunks (or before the response head).
    Read,
    /// Wall-clock time of the whole exchange.
    Total,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Total => "total",
        };
        f.write_str(label)
    }
}

/// Coarse kind of a network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// Connection refused, reset, DNS failure.
    Connect,
    /// TLS handshake or certificate problem.
    Tls,
    /// Malformed HTTP framing, aborted body stream.
    Protocol,
    /// Proxy refused or failed the tunnel.
    Proxy,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connection",
            Self::Tls => "TLS",
            Self::Protocol => "protocol",
            Self::Proxy => "proxy",
        };
        f.write_str(label)
    }
}

/// Errors raised by a `request()` call.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller violated the API contract (unknown option, missing payload,
    /// proxy without a type, ...). Never retried.
    #[error("usage error: {message}")]
    Usage {
        /// What was wrong.
        message: String,
    },

    /// The target URL failed normalization.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL as supplied.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Connect, protocol or TLS failure.
    #[error("{kind} error requesting {url}: {message}")]
    Network {
        /// The URL being requested.
        url: String,
        /// Failure kind.
        kind: NetworkFailure,
        /// Human-readable detail.
        message: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A connect, read or total timeout elapsed.
    #[error("{phase} timeout requesting {url}")]
    Timeout {
        /// The URL being requested.
        url: String,
        /// Which bound was exceeded.
        phase: TimeoutPhase,
    },

    /// The redirect counter exceeded `redirect_limit`.
    #[error("too many redirects requesting {url} (limit {limit})")]
    TooManyRedirects {
        /// The URL whose response asked for one redirect too many.
        url: String,
        /// Configured limit.
        limit: u32,
    },

    /// The response could not be understood well enough to classify it.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse {
        /// The URL being requested.
        url: String,
        /// What could not be parsed.
        reason: String,
    },

    /// File system error (body storage, cookie files, session files).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A session snapshot could not be encoded or decoded.
    #[error("session snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl Error {
    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a network error from a client error.
    pub fn network(url: impl Into<String>, kind: NetworkFailure, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            kind,
            message: source.to_string(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, phase: TimeoutPhase) -> Self {
        Self::Timeout {
            url: url.into(),
            phase,
        }
    }

    /// Creates a too-many-redirects error.
    pub fn too_many_redirects(url: impl Into<String>, limit: u32) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            limit,
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors the caller caused and can fix without any
    /// change on the remote side.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. } | Self::InvalidUrl { .. })
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs the
// url or path the source error lacks. Use the constructors above.
