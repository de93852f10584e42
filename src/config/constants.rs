//! Defaults for request options (timeouts, redirects).

use std::time::Duration;

/// Default connect timeout when `connect_timeout` is unset (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default total response timeout when `timeout` is unset (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of redirects followed per `request()` call.
pub const DEFAULT_REDIRECT_LIMIT: u32 = 10;

/// Charset used to encode payloads when none is configured.
pub const DEFAULT_CHARSET: &str = "utf-8";
