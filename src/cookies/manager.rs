//! Session-level cookie state.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::jar::{Cookie, CookieJar};
use super::netscape::{parse_netscape_cookies, write_netscape_cookies};
use crate::config::Headers;
use crate::error::Error;

/// Owns the session cookie jar and applies it to outgoing requests.
#[derive(Debug, Clone, Default)]
pub struct CookieManager {
    jar: CookieJar,
}

impl CookieManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    /// `Cookie` header value for `url`.
    ///
    /// Returns `None` when `extra_headers` already carries an explicit
    /// `Cookie` header, which always wins over the jar.
    #[must_use]
    pub fn cookie_header_for(&self, url: &Url, extra_headers: &Headers) -> Option<String> {
        if extra_headers.contains("Cookie") {
            debug!("explicit Cookie header present, skipping jar");
            return None;
        }
        self.jar.header_value(url)
    }

    /// Stores domain-less `name -> value` cookies for the host of `url`.
    ///
    /// The domain is the host with a leading `www.` stripped, so the cookies
    /// reach both the bare and the `www.` host.
    pub fn apply_session_cookies(&mut self, url: &Url, cookies: &BTreeMap<String, String>) {
        let Some(host) = url.host_str() else {
            return;
        };
        let host = host.to_ascii_lowercase();
        let domain = host.strip_prefix("www.").unwrap_or(&host);
        for (name, value) in cookies {
            self.jar.insert(Cookie::new(name.as_str(), value.as_str(), domain));
        }
    }

    /// Merges response-set cookies into the session jar.
    pub fn absorb(&mut self, jar: &CookieJar) {
        if !jar.is_empty() {
            debug!(count = jar.len(), "absorbing response cookies");
        }
        self.jar.absorb(jar);
    }

    /// Loads a Netscape cookie file into the jar.
    ///
    /// A missing file is not an error; it is logged and nothing is loaded.
    /// Returns the number of cookies loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file exists but cannot be read.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&mut self, path: &Path) -> Result<usize, Error> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "cookie file not found, skipping");
                return Ok(0);
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        let parsed = parse_netscape_cookies(BufReader::new(file)).map_err(|e| Error::io(path, e))?;
        let count = parsed.cookies.len();
        for cookie in parsed.cookies {
            self.jar.set(cookie);
        }
        debug!(count, skipped = parsed.warnings.len(), "loaded cookie file");
        Ok(count)
    }

    /// Writes the jar to a Netscape cookie file. Expired cookies are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be written.
    #[instrument(level = "debug", skip(self))]
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let now = super::jar::now_unix();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let live = self.jar.iter().filter(|c| !c.is_expired(now));
        write_netscape_cookies(BufWriter::new(file), live).map_err(|e| Error::io(path, e))?;
        info!(path = %path.display(), count = self.jar.len(), "saved cookies");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.jar.clear();
    }

    /// Ordered cookie records for serialization.
    #[must_use]
    pub fn export(&self) -> Vec<Cookie> {
        self.jar.to_vec()
    }

    /// Replaces the jar with `cookies`, keeping their order.
    pub fn import(&mut self, cookies: Vec<Cookie>) {
        self.jar = cookies.into_iter().collect();
    }
}
