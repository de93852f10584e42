//! Proxy pool sources for automatic proxy rotation.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::ProxyType;
use crate::error::Error;

/// One proxy endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyServer {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    password: Option<String>,
    /// `None` when the list line declared no type.
    pub proxy_type: Option<ProxyType>,
}

impl ProxyServer {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, proxy_type: Option<ProxyType>) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            proxy_type,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `user:password`, when credentials are set.
    #[must_use]
    pub fn userpwd(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{user}:{pass}")),
            _ => None,
        }
    }

    /// Parses `[type://]host:port[:user:password]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for a malformed line.
    pub fn parse(line: &str, default_type: Option<ProxyType>) -> Result<Self, Error> {
        let line = line.trim();
        let (proxy_type, rest) = match line.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.parse::<ProxyType>()?), rest),
            None => (default_type, line),
        };
        let parts: Vec<&str> = rest.split(':').collect();
        let (host, port, creds) = match parts.as_slice() {
            [host, port] => (*host, *port, None),
            [host, port, user, pass] => (*host, *port, Some((*user, *pass))),
            _ => {
                return Err(Error::usage(format!(
                    "proxy line must be host:port[:user:password], got '{line}'"
                )));
            }
        };
        if host.is_empty() {
            return Err(Error::usage(format!("proxy line has empty host: '{line}'")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::usage(format!("invalid proxy port in '{line}'")))?;
        let server = Self::new(host, port, proxy_type);
        Ok(match creds {
            Some((user, pass)) => server.with_credentials(user, pass),
            None => server,
        })
    }
}

impl fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("proxy_type", &self.proxy_type)
            .finish()
    }
}

/// How the next proxy is picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyStrategy {
    #[default]
    Random,
    RoundRobin,
}

/// A pool of proxies the engine can rotate through.
pub trait ProxySource: Send + Sync {
    fn size(&self) -> usize;
    fn get_random_server(&self) -> Option<ProxyServer>;
    fn get_next_server(&self) -> Option<ProxyServer>;
}

/// In-memory proxy list with a shared round-robin cursor.
#[derive(Debug, Default)]
pub struct ProxyList {
    servers: Vec<ProxyServer>,
    cursor: AtomicUsize,
}

impl ProxyList {
    #[must_use]
    pub fn new(servers: Vec<ProxyServer>) -> Self {
        Self {
            servers,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Builds a list from text lines, skipping blanks, `#` comments and
    /// malformed lines.
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a str>,
        default_type: Option<ProxyType>,
    ) -> Self {
        let servers = lines
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|line| match ProxyServer::parse(line, default_type) {
                Ok(server) => Some(server),
                Err(e) => {
                    warn!(error = %e, "skipping proxy line");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(count = servers.len(), "loaded proxy list");
        Self::new(servers)
    }

    /// Reads a proxy list file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read.
    pub fn from_file(path: &Path, default_type: Option<ProxyType>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::from_lines(content.lines(), default_type))
    }

    #[must_use]
    pub fn servers(&self) -> &[ProxyServer] {
        &self.servers
    }
}

impl ProxySource for ProxyList {
    fn size(&self) -> usize {
        self.servers.len()
    }

    fn get_random_server(&self) -> Option<ProxyServer> {
        self.servers.choose(&mut rand::thread_rng()).cloned()
    }

    fn get_next_server(&self) -> Option<ProxyServer> {
        if self.servers.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.servers.len();
        self.servers.get(idx).cloned()
    }
}
