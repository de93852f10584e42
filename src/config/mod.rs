//! Config store: the per-session option record.
//!
//! [`Config`] is a plain record whose fields are the full option set. Every
//! mutable value (headers, cookies, payloads) is owned, so `clone()` yields a
//! config that shares nothing with its source: two sessions derived from one
//! ancestor can never observe each other's edits.
//!
//! # Example
//!
//! ```
//! use snare_core::config::{Config, ConfigOption};
//!
//! let mut config = Config::default();
//! config.resolve([ConfigOption::Url("https://example.com/a/b".into())]);
//! config.resolve([ConfigOption::Url("../c".into())]);
//! assert_eq!(config.url.as_deref(), Some("https://example.com/c"));
//! ```

pub mod constants;
mod option;
mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

pub use constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REDIRECT_LIMIT, DEFAULT_TIMEOUT};
pub use option::{ConfigOption, OptionKey};
pub use types::{
    DocumentType, Headers, HttpMethod, MultipartField, MultipartValue, PostData, ProxyType,
};
pub(crate) use types::encoding_for_label;

/// Request and session options.
///
/// Request options describe the next `request()` call; `method`, `post` and
/// `multipart_post` are one-shot and cleared after every dispatch. Session
/// options (`reuse_cookies`, `common_headers`, `proxy_auto_change`) shape all
/// calls of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub proxy: Option<String>,
    pub proxy_type: Option<ProxyType>,
    pub proxy_userpwd: Option<String>,
    pub headers: Headers,
    /// Domain-less cookies applied to every requested host.
    pub cookies: BTreeMap<String, String>,
    /// Bound on the whole exchange.
    pub timeout: Option<Duration>,
    /// Bound on the gap between body chunks; falls back to `timeout`.
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Charset used to encode `post` text.
    pub charset: String,
    /// Charset hint for decoding the response body.
    pub document_charset: Option<String>,
    pub post: Option<PostData>,
    pub multipart_post: Option<Vec<MultipartField>>,
    pub redirect_limit: u32,
    pub follow_location: bool,
    pub document_type: DocumentType,
    pub body_maxsize: Option<usize>,
    pub nobody: bool,
    pub body_inmemory: bool,
    pub body_storage_dir: Option<PathBuf>,
    pub body_storage_filename: Option<String>,
    pub body_storage_create_dir: bool,
    pub user_agent: Option<String>,
    pub user_agent_file: Option<PathBuf>,
    /// Netscape cookie file loaded into the jar before each request.
    pub cookiefile: Option<PathBuf>,
    pub reuse_cookies: bool,
    pub common_headers: Headers,
    pub proxy_auto_change: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: None,
            url: None,
            proxy: None,
            proxy_type: None,
            proxy_userpwd: None,
            headers: Headers::new(),
            cookies: BTreeMap::new(),
            timeout: None,
            read_timeout: None,
            connect_timeout: None,
            charset: constants::DEFAULT_CHARSET.to_string(),
            document_charset: None,
            post: None,
            multipart_post: None,
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            follow_location: true,
            document_type: DocumentType::Html,
            body_maxsize: None,
            nobody: false,
            body_inmemory: true,
            body_storage_dir: None,
            body_storage_filename: None,
            body_storage_create_dir: false,
            user_agent: None,
            user_agent_file: None,
            cookiefile: None,
            reuse_cookies: true,
            common_headers: Headers::new(),
            proxy_auto_change: true,
        }
    }
}

impl Config {
    /// Merges overrides onto this config.
    ///
    /// A relative `url` is joined against the current `url` before it is
    /// stored.
    pub fn resolve(&mut self, overrides: impl IntoIterator<Item = ConfigOption>) {
        for option in overrides {
            self.apply(option);
        }
    }

    /// Parses and applies string `(key, value)` pairs.
    ///
    /// All pairs are validated before any is applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for an unknown key or unparseable value; the
    /// config is left untouched in that case.
    pub fn apply_pairs<K, V>(&mut self, pairs: &[(K, V)]) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed = pairs
            .iter()
            .map(|(k, v)| ConfigOption::parse(k.as_ref(), v.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.resolve(parsed);
        Ok(())
    }

    /// Clears the options that must not leak into the next call.
    pub fn reset_temporary_options(&mut self) {
        self.post = None;
        self.multipart_post = None;
        self.method = None;
    }

    /// Makes `url` absolute using the current `url` as base.
    #[must_use]
    pub fn make_url_absolute(&self, url: &str) -> String {
        match self.url.as_deref() {
            Some(base) => join_url(base, url),
            None => url.to_string(),
        }
    }

    /// Total timeout with the default applied.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Per-chunk read timeout with fallbacks applied.
    #[must_use]
    pub fn effective_read_timeout(&self) -> Duration {
        self.read_timeout.unwrap_or_else(|| self.effective_timeout())
    }

    /// Connect timeout with the default applied.
    #[must_use]
    pub fn effective_connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    fn apply(&mut self, option: ConfigOption) {
        debug!(option = %option.key(), "applying config option");
        match option {
            ConfigOption::Method(v) => self.method = v,
            ConfigOption::Url(v) => self.url = Some(self.make_url_absolute(&v)),
            ConfigOption::Proxy(v) => self.proxy = v,
            ConfigOption::ProxyType(v) => self.proxy_type = v,
            ConfigOption::ProxyUserpwd(v) => self.proxy_userpwd = v,
            ConfigOption::Headers(v) => self.headers = v,
            ConfigOption::Cookies(v) => self.cookies = v,
            ConfigOption::Timeout(v) => self.timeout = v,
            ConfigOption::ReadTimeout(v) => self.read_timeout = v,
            ConfigOption::ConnectTimeout(v) => self.connect_timeout = v,
            ConfigOption::Charset(v) => self.charset = v,
            ConfigOption::DocumentCharset(v) => self.document_charset = v,
            ConfigOption::Post(v) => self.post = v,
            ConfigOption::MultipartPost(v) => self.multipart_post = v,
            ConfigOption::RedirectLimit(v) => self.redirect_limit = v,
            ConfigOption::FollowLocation(v) => self.follow_location = v,
            ConfigOption::DocumentType(v) => self.document_type = v,
            ConfigOption::BodyMaxsize(v) => self.body_maxsize = v,
            ConfigOption::Nobody(v) => self.nobody = v,
            ConfigOption::BodyInmemory(v) => self.body_inmemory = v,
            ConfigOption::BodyStorageDir(v) => self.body_storage_dir = v,
            ConfigOption::BodyStorageFilename(v) => self.body_storage_filename = v,
            ConfigOption::BodyStorageCreateDir(v) => self.body_storage_create_dir = v,
            ConfigOption::UserAgent(v) => self.user_agent = v,
            ConfigOption::UserAgentFile(v) => self.user_agent_file = v,
            ConfigOption::Cookiefile(v) => self.cookiefile = v,
            ConfigOption::ReuseCookies(v) => self.reuse_cookies = v,
            ConfigOption::CommonHeaders(v) => self.common_headers = v,
            ConfigOption::ProxyAutoChange(v) => self.proxy_auto_change = v,
        }
    }
}

/// Joins `url` against `base` with the usual same-document rules.
///
/// Falls back to `url` unchanged when `base` is not an absolute URL or the
/// join fails; normalization errors surface later, when the request is built.
#[must_use]
pub fn join_url(base: &str, url: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(url))
        .map_or_else(|_| url.to_string(), String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.redirect_limit, 10);
        assert!(config.follow_location);
        assert!(config.reuse_cookies);
        assert!(config.body_inmemory);
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.effective_read_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.effective_connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_read_timeout_falls_back_to_timeout() {
        let mut config = Config::default();
        config.resolve([ConfigOption::Timeout(Some(Duration::from_secs(4)))]);
        assert_eq!(config.effective_read_timeout(), Duration::from_secs(4));
        config.resolve([ConfigOption::ReadTimeout(Some(Duration::from_secs(1)))]);
        assert_eq!(config.effective_read_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_clone_does_not_alias_mutable_values() {
        let mut original = Config::default();
        original.headers.insert("X-Original", "1");
        original.cookies.insert("sid".into(), "a".into());
        original.post = Some(PostData::Form(vec![("k".into(), "v".into())]));
        original.multipart_post = Some(vec![MultipartField::text("f", "1")]);

        let mut clone = original.clone();
        clone.headers.insert("X-Clone", "2");
        clone.cookies.insert("sid".into(), "b".into());
        if let Some(PostData::Form(pairs)) = clone.post.as_mut() {
            pairs.push(("k2".into(), "v2".into()));
        }
        if let Some(fields) = clone.multipart_post.as_mut() {
            fields.clear();
        }

        assert!(!original.headers.contains("X-Clone"));
        assert_eq!(original.cookies.get("sid").map(String::as_str), Some("a"));
        assert_eq!(
            original.post,
            Some(PostData::Form(vec![("k".into(), "v".into())]))
        );
        assert_eq!(original.multipart_post.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_relative_url_resolved_against_previous() {
        let mut config = Config::default();
        config.resolve([ConfigOption::Url("http://example.com/dir/page".into())]);
        config.resolve([ConfigOption::Url("/next".into())]);
        assert_eq!(config.url.as_deref(), Some("http://example.com/next"));
        config.resolve([ConfigOption::Url("?q=1".into())]);
        assert_eq!(config.url.as_deref(), Some("http://example.com/next?q=1"));
    }

    #[test]
    fn test_first_url_stored_verbatim() {
        let mut config = Config::default();
        config.resolve([ConfigOption::Url("example.com".into())]);
        assert_eq!(config.url.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_apply_pairs_is_all_or_nothing() {
        let mut config = Config::default();
        let pairs = [("redirect_limit", "2"), ("no_such_option", "1")];
        let result = config.apply_pairs(&pairs);
        assert!(matches!(result, Err(Error::Usage { .. })));
        assert_eq!(config.redirect_limit, DEFAULT_REDIRECT_LIMIT);

        config
            .apply_pairs(&[("redirect_limit", "2"), ("nobody", "true")])
            .unwrap();
        assert_eq!(config.redirect_limit, 2);
        assert!(config.nobody);
    }

    #[test]
    fn test_reset_temporary_options() {
        let mut config = Config::default();
        config.resolve([
            ConfigOption::Method(Some(HttpMethod::Put)),
            ConfigOption::Post(Some(PostData::Text("x".into()))),
            ConfigOption::MultipartPost(Some(vec![MultipartField::text("a", "b")])),
            ConfigOption::Headers([("X-Keep", "1")].into_iter().collect()),
        ]);
        config.reset_temporary_options();
        assert!(config.method.is_none());
        assert!(config.post.is_none());
        assert!(config.multipart_post.is_none());
        assert_eq!(config.headers.get("X-Keep"), Some("1"));
    }

    #[test]
    fn test_join_url_with_bad_base_keeps_url() {
        assert_eq!(join_url("not a url", "/x"), "/x");
        assert_eq!(
            join_url("https://a.example/b/", "c"),
            "https://a.example/b/c"
        );
    }
}
