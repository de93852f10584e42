//! The request descriptor handed to a [`Transport`](super::Transport).

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT, DocumentType, Headers, HttpMethod, MultipartField,
    ProxyType,
};

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Already encoded body bytes.
    Bytes(Vec<u8>),
    /// Parts encoded as `multipart/form-data` at dispatch.
    Multipart(Vec<MultipartField>),
}

/// Proxy a request is routed through.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// `host:port`.
    pub address: String,
    pub proxy_type: ProxyType,
    /// `user:password`.
    pub userpwd: Option<String>,
}

impl ProxySettings {
    /// Proxy URL understood by the HTTP client.
    ///
    /// SOCKS credentials travel in the URL; HTTP(S) proxies use basic auth.
    #[must_use]
    pub fn proxy_url(&self) -> String {
        match (&self.userpwd, self.proxy_type.is_socks()) {
            (Some(userpwd), true) => {
                let (user, pass) = split_userpwd(userpwd);
                format!(
                    "{}://{}:{}@{}",
                    self.proxy_type.scheme(),
                    urlencoding::encode(user),
                    urlencoding::encode(pass),
                    self.address
                )
            }
            _ => format!("{}://{}", self.proxy_type.scheme(), self.address),
        }
    }

    /// Username and password for proxy basic auth.
    #[must_use]
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        if self.proxy_type.is_socks() {
            return None;
        }
        self.userpwd.as_deref().map(split_userpwd)
    }
}

impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("address", &self.address)
            .field("proxy_type", &self.proxy_type)
            .field("userpwd", &self.userpwd.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn split_userpwd(userpwd: &str) -> (&str, &str) {
    userpwd.split_once(':').unwrap_or((userpwd, ""))
}

/// Everything one dispatch needs. Built fresh for every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Headers,
    pub body: RequestBody,
    /// Bound on the whole exchange.
    pub timeout: Duration,
    /// Bound on the gap between body chunks.
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<ProxySettings>,
    pub body_maxsize: Option<usize>,
    /// Skip reading the body.
    pub nobody: bool,
    /// Stream the body to this file instead of memory.
    pub response_path: Option<PathBuf>,
    pub charset_hint: Option<String>,
    pub document_type: DocumentType,
}

impl Request {
    /// A bodiless request with default timeouts.
    #[must_use]
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: RequestBody::Empty,
            timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            proxy: None,
            body_maxsize: None,
            nobody: false,
            response_path: None,
            charset_hint: None,
            document_type: DocumentType::Html,
        }
    }

    /// Whether the response body should be read at all.
    #[must_use]
    pub fn wants_body(&self) -> bool {
        !self.nobody && self.method != HttpMethod::Head
    }
}
