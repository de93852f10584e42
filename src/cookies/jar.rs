//! Cookie records and the ordered jar that holds them.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// A single cookie.
///
/// The value is redacted in Debug output so cookies can be traced without
/// leaking session tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    value: String,
    /// Lower-case domain without a leading dot.
    pub domain: String,
    /// Whether subdomains of `domain` also match.
    pub include_subdomains: bool,
    pub path: String,
    /// Unix timestamp; `None` for a session cookie.
    pub expires: Option<u64>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    /// Creates a cookie valid for `domain` and its subdomains on every path.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: &str) -> Self {
        let (domain, _) = normalize_domain(domain);
        Self {
            name: name.into(),
            value: value.into(),
            domain,
            include_subdomains: true,
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Returns the cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_expires(mut self, expires: Option<u64>) -> Self {
        self.expires = expires;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Restricts the cookie to `domain` itself.
    #[must_use]
    pub fn host_only(mut self) -> Self {
        self.include_subdomains = false;
        self
    }

    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires.is_some_and(|t| t <= now)
    }

    /// Whether this cookie should be sent with a request to `url`.
    #[must_use]
    pub fn matches(&self, url: &Url, now: u64) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        self.domain_matches(&host.to_ascii_lowercase()) && path_matches(url.path(), &self.path)
    }

    fn domain_matches(&self, host: &str) -> bool {
        host == self.domain
            || (self.include_subdomains
                && host.len() > self.domain.len()
                && host.ends_with(&self.domain)
                && host.as_bytes()[host.len() - self.domain.len() - 1] == b'.')
    }

    fn same_key(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("include_subdomains", &self.include_subdomains)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .finish()
    }
}

/// Ordered set of cookies keyed by (name, domain, path).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar(Vec<Cookie>);

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `cookie`, replacing an existing cookie with the same key in
    /// place.
    pub fn insert(&mut self, cookie: Cookie) {
        match self.0.iter_mut().find(|c| c.same_key(&cookie)) {
            Some(existing) => *existing = cookie,
            None => self.0.push(cookie),
        }
    }

    /// Like [`insert`](Self::insert), but an already expired cookie deletes
    /// the stored one instead.
    pub fn set(&mut self, cookie: Cookie) {
        if cookie.is_expired(now_unix()) {
            self.0.retain(|c| !c.same_key(&cookie));
        } else {
            self.insert(cookie);
        }
    }

    /// Merges every cookie of `other` with [`set`](Self::set) semantics.
    pub fn absorb(&mut self, other: &CookieJar) {
        for cookie in other.iter() {
            self.set(cookie.clone());
        }
    }

    /// Parses `Set-Cookie` values received from `url` and stores them.
    pub fn store_response_cookies<'a>(&mut self, url: &Url, values: impl IntoIterator<Item = &'a str>) {
        for value in values {
            if let Some(cookie) = parse_set_cookie(url, value) {
                self.set(cookie);
            }
        }
    }

    /// Cookies that should be sent to `url`, longest path first.
    #[must_use]
    pub fn matching(&self, url: &Url) -> Vec<&Cookie> {
        let now = now_unix();
        let mut cookies: Vec<&Cookie> = self.0.iter().filter(|c| c.matches(url, now)).collect();
        cookies.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        cookies
    }

    /// `Cookie` header value for `url`, or `None` when nothing matches.
    #[must_use]
    pub fn header_value(&self, url: &Url) -> Option<String> {
        let cookies = self.matching(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// First cookie called `name`, regardless of domain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.0.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// The flat, ordered record list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Cookie> {
        self.0.clone()
    }
}

impl FromIterator<Cookie> for CookieJar {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        let mut jar = Self::new();
        for cookie in iter {
            jar.insert(cookie);
        }
        jar
    }
}

/// Parses one `Set-Cookie` header value received from `url`.
///
/// Returns `None` for a malformed value or a `Domain` attribute the request
/// host does not belong to.
#[must_use]
pub fn parse_set_cookie(url: &Url, header: &str) -> Option<Cookie> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.clone(),
        include_subdomains: false,
        path: default_path(url.path()),
        expires: None,
        secure: false,
        http_only: false,
    };
    let mut max_age = None;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => {
                let (domain, _) = normalize_domain(val);
                cookie.domain = domain;
                cookie.include_subdomains = true;
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "expires" => {
                cookie.expires = httpdate::parse_http_date(val)
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs());
            }
            "max-age" => max_age = val.parse::<i64>().ok(),
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            _ => {}
        }
    }

    if let Some(secs) = max_age {
        cookie.expires = Some(match u64::try_from(secs) {
            Ok(secs) if secs > 0 => now_unix().saturating_add(secs),
            _ => 0,
        });
    }

    if !cookie.domain_matches(&host) {
        warn!(
            host = %host,
            domain = %cookie.domain,
            name = %cookie.name,
            "rejecting cookie for foreign domain"
        );
        return None;
    }
    debug!(domain = %cookie.domain, name = %cookie.name, "received cookie");
    Some(cookie)
}

pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Lower-cases `domain` and strips a leading dot, reporting whether one was
/// present.
pub(crate) fn normalize_domain(domain: &str) -> (String, bool) {
    let domain = domain.trim().to_ascii_lowercase();
    match domain.strip_prefix('.') {
        Some(rest) => (rest.to_string(), true),
        None => (domain, false),
    }
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}
