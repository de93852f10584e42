//! The normalized response handed back by `request()`.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::bytes::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{DocumentType, Headers, encoding_for_label};
use crate::cookies::CookieJar;
use crate::error::Error;

/// Bytes scanned for a `<meta charset>` declaration.
const META_SCAN_LIMIT: usize = 4096;

#[allow(clippy::expect_used)]
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-z0-9_\-]+)"#)
        .expect("meta charset regex is valid") // Static pattern, safe to panic
});

/// Response body, resident or stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Memory(Vec<u8>),
    File(PathBuf),
}

impl Default for Body {
    fn default() -> Self {
        Self::Memory(Vec::new())
    }
}

/// A received response.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub status: u16,
    /// Status line plus header lines, as received.
    pub head: String,
    pub headers: Headers,
    pub body: Body,
    /// Request URL, or the resolved redirect target for a redirect response.
    pub url: String,
    /// Cookies set by this response.
    pub cookies: CookieJar,
    /// When the engine classified the response.
    pub timestamp: Option<DateTime<Utc>>,
    /// Charset used by [`unicode_body`](Self::unicode_body).
    pub charset: String,
    pub document_type: DocumentType,
    /// The body was cut at `body_maxsize`.
    pub truncated: bool,
}

impl Document {
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            charset: "utf-8".to_string(),
            ..Self::default()
        }
    }

    /// First header value called `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Detects the body charset.
    ///
    /// Order: `Content-Type` charset parameter, `<meta charset>` in the first
    /// bytes of the body, `hint`, then `utf-8`.
    pub fn parse(&mut self, hint: Option<&str>) {
        let detected = self
            .header("Content-Type")
            .and_then(content_type_charset)
            .or_else(|| match &self.body {
                Body::Memory(bytes) => meta_charset(bytes),
                Body::File(_) => None,
            })
            .or_else(|| hint.map(str::to_ascii_lowercase))
            .unwrap_or_else(|| "utf-8".to_string());
        debug!(charset = %detected, url = %self.url, "detected document charset");
        self.charset = detected;
    }

    /// Body bytes, read from disk for a file-backed body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when a stored body cannot be read.
    pub fn body_bytes(&self) -> Result<Cow<'_, [u8]>, Error> {
        match &self.body {
            Body::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            Body::File(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| Error::io(path, e)),
        }
    }

    /// Body decoded with the detected charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when a stored body cannot be read.
    pub fn unicode_body(&self) -> Result<String, Error> {
        let bytes = self.body_bytes()?;
        Ok(decode(&bytes, &self.charset))
    }

    /// Deserializes a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] when the body is not valid JSON for
    /// `T`, or [`Error::Io`] when a stored body cannot be read.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let bytes = self.body_bytes()?;
        serde_json::from_slice(&bytes).map_err(|e| Error::invalid_response(&self.url, e))
    }
}

fn content_type_charset(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| val.trim().trim_matches('"').to_ascii_lowercase())
            .filter(|c| !c.is_empty())
    })
}

fn meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(META_SCAN_LIMIT)];
    META_CHARSET
        .captures(head)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_ascii_lowercase())
}

fn decode(bytes: &[u8], charset: &str) -> String {
    match encoding_for_label(charset) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            debug!(charset, "unknown charset, decoding as utf-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
