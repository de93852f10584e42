//! Value types used by [`Config`](super::Config) options.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use encoding_rs::{Encoding, WINDOWS_1252};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Canonical upper-case method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Methods that cannot be sent without a `post` or `multipart_post` payload.
    #[must_use]
    pub fn requires_payload(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(Error::usage(format!("unsupported HTTP method: {other}"))),
        }
    }
}

/// Proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// URL scheme used to address the proxy.
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks4 => "socks4",
            Self::Socks5 => "socks5",
        }
    }

    /// SOCKS proxies tunnel the whole connection; HTTP proxies forward requests.
    #[must_use]
    pub fn is_socks(self) -> bool {
        matches!(self, Self::Socks4 | Self::Socks5)
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for ProxyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "socks4" => Ok(Self::Socks4),
            "socks5" | "socks" => Ok(Self::Socks5),
            other => Err(Error::usage(format!("unsupported proxy type: {other}"))),
        }
    }
}

/// How the response body is expected to be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Html,
    Json,
    Xml,
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(Error::usage(format!("unsupported document type: {other}"))),
        }
    }
}

/// Ordered header list with case-insensitive names.
///
/// Inserting a name that already exists (in any case) replaces its value in
/// place, so the original position and spelling of the first insert win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any existing entry.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.0[idx].1 = value,
            None => self.0.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.0[idx].1.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.0.remove(idx).1)
    }

    /// Copies every entry of `other` over this list.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Body of a `post` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PostData {
    /// Sent as-is.
    Raw(Vec<u8>),
    /// Encoded with the `charset` option.
    Text(String),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
}

impl PostData {
    /// Encodes the payload into request body bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] when text cannot be represented in `charset`.
    pub fn encode(&self, charset: &str) -> Result<Vec<u8>, Error> {
        match self {
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::Text(text) => encode_text(text, charset),
            Self::Form(pairs) => {
                let encoded = pairs
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&");
                encode_text(&encoded, charset)
            }
        }
    }

    /// Content type implied by the payload shape, if any.
    #[must_use]
    pub fn implied_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
            Self::Raw(_) | Self::Text(_) => None,
        }
    }
}

/// Looks up a codec by charset label (`latin-1` is accepted as an alias).
pub(crate) fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    if label.eq_ignore_ascii_case("latin-1") {
        return Some(WINDOWS_1252);
    }
    Encoding::for_label(label.as_bytes())
}

/// Encodes text in the given request charset.
pub(crate) fn encode_text(text: &str, charset: &str) -> Result<Vec<u8>, Error> {
    let encoding = encoding_for_label(charset)
        .ok_or_else(|| Error::usage(format!("unsupported request charset: {charset}")))?;
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(Error::usage(format!(
            "text cannot be encoded as {charset}"
        )));
    }
    Ok(bytes.into_owned())
}

/// One field of a `multipart_post` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

impl MultipartField {
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }
}

/// Value of a multipart field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MultipartValue {
    /// Plain form field.
    Text(String),
    /// In-memory upload.
    Content {
        data: Vec<u8>,
        filename: String,
        content_type: Option<String>,
    },
    /// Upload read from disk when the request is built.
    File {
        path: PathBuf,
        filename: Option<String>,
        content_type: Option<String>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_insert_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        headers.insert("content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Content-Type"]);
    }

    #[test]
    fn test_headers_merge_overrides() {
        let mut base: Headers = [("Accept", "*/*"), ("X-A", "1")].into_iter().collect();
        let extra: Headers = [("accept", "text/html")].into_iter().collect();
        base.merge(&extra);
        assert_eq!(base.get("Accept"), Some("text/html"));
        assert_eq!(base.get("x-a"), Some("1"));
    }

    #[test]
    fn test_form_post_is_urlencoded() {
        let post = PostData::Form(vec![
            ("q".to_string(), "rust lang".to_string()),
            ("page".to_string(), "2&3".to_string()),
        ]);
        let body = post.encode("utf-8").unwrap();
        assert_eq!(body, b"q=rust%20lang&page=2%263");
        assert_eq!(
            post.implied_content_type(),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_text_post_latin1() {
        let post = PostData::Text("caf\u{e9}".to_string());
        assert_eq!(post.encode("iso-8859-1").unwrap(), vec![b'c', b'a', b'f', 0xe9]);
        let wide = PostData::Text("\u{442}".to_string());
        assert!(matches!(wide.encode("latin1"), Err(Error::Usage { .. })));
    }

    #[test]
    fn test_text_post_cyrillic_charsets() {
        let post = PostData::Text("\u{44f}".to_string());
        assert_eq!(post.encode("windows-1251").unwrap(), vec![0xff]);
        assert_eq!(post.encode("KOI8-R").unwrap(), vec![0xd1]);
    }

    #[test]
    fn test_unknown_charset_is_usage_error() {
        let post = PostData::Text("x".to_string());
        assert!(matches!(
            post.encode("no-such-charset"),
            Err(Error::Usage { .. })
        ));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert!("FETCH".parse::<HttpMethod>().is_err());
        assert!(HttpMethod::Put.requires_payload());
        assert!(HttpMethod::Patch.requires_payload());
        assert!(!HttpMethod::Delete.requires_payload());
    }

    #[test]
    fn test_proxy_type_parse() {
        assert_eq!("SOCKS5".parse::<ProxyType>().unwrap(), ProxyType::Socks5);
        assert!(ProxyType::Socks4.is_socks());
        assert!(!ProxyType::Https.is_socks());
        assert!("ftp".parse::<ProxyType>().is_err());
    }
}
