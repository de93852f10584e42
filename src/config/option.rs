//! The enumerated option set and typed overrides.
//!
//! [`ConfigOption`] is how code changes a [`Config`](super::Config): one
//! variant per option, each carrying a value of the option's type. String
//! pairs coming from the command line or a file go through
//! [`ConfigOption::parse`], which is the only place an unknown key can occur.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

use super::types::{DocumentType, Headers, HttpMethod, MultipartField, PostData, ProxyType};

/// Names of every configurable option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Method,
    Url,
    Proxy,
    ProxyType,
    ProxyUserpwd,
    Headers,
    Cookies,
    Timeout,
    ReadTimeout,
    ConnectTimeout,
    Charset,
    DocumentCharset,
    Post,
    MultipartPost,
    RedirectLimit,
    FollowLocation,
    DocumentType,
    BodyMaxsize,
    Nobody,
    BodyInmemory,
    BodyStorageDir,
    BodyStorageFilename,
    BodyStorageCreateDir,
    UserAgent,
    UserAgentFile,
    Cookiefile,
    ReuseCookies,
    CommonHeaders,
    ProxyAutoChange,
}

impl OptionKey {
    /// Every option, in documentation order.
    pub const ALL: [OptionKey; 29] = [
        Self::Method,
        Self::Url,
        Self::Proxy,
        Self::ProxyType,
        Self::ProxyUserpwd,
        Self::Headers,
        Self::Cookies,
        Self::Timeout,
        Self::ReadTimeout,
        Self::ConnectTimeout,
        Self::Charset,
        Self::DocumentCharset,
        Self::Post,
        Self::MultipartPost,
        Self::RedirectLimit,
        Self::FollowLocation,
        Self::DocumentType,
        Self::BodyMaxsize,
        Self::Nobody,
        Self::BodyInmemory,
        Self::BodyStorageDir,
        Self::BodyStorageFilename,
        Self::BodyStorageCreateDir,
        Self::UserAgent,
        Self::UserAgentFile,
        Self::Cookiefile,
        Self::ReuseCookies,
        Self::CommonHeaders,
        Self::ProxyAutoChange,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Url => "url",
            Self::Proxy => "proxy",
            Self::ProxyType => "proxy_type",
            Self::ProxyUserpwd => "proxy_userpwd",
            Self::Headers => "headers",
            Self::Cookies => "cookies",
            Self::Timeout => "timeout",
            Self::ReadTimeout => "read_timeout",
            Self::ConnectTimeout => "connect_timeout",
            Self::Charset => "charset",
            Self::DocumentCharset => "document_charset",
            Self::Post => "post",
            Self::MultipartPost => "multipart_post",
            Self::RedirectLimit => "redirect_limit",
            Self::FollowLocation => "follow_location",
            Self::DocumentType => "document_type",
            Self::BodyMaxsize => "body_maxsize",
            Self::Nobody => "nobody",
            Self::BodyInmemory => "body_inmemory",
            Self::BodyStorageDir => "body_storage_dir",
            Self::BodyStorageFilename => "body_storage_filename",
            Self::BodyStorageCreateDir => "body_storage_create_dir",
            Self::UserAgent => "user_agent",
            Self::UserAgentFile => "user_agent_file",
            Self::Cookiefile => "cookiefile",
            Self::ReuseCookies => "reuse_cookies",
            Self::CommonHeaders => "common_headers",
            Self::ProxyAutoChange => "proxy_auto_change",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| Error::usage(format!("unknown option: {key}")))
    }
}

/// A typed override for one option.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOption {
    Method(Option<HttpMethod>),
    Url(String),
    Proxy(Option<String>),
    ProxyType(Option<ProxyType>),
    ProxyUserpwd(Option<String>),
    Headers(Headers),
    Cookies(BTreeMap<String, String>),
    Timeout(Option<Duration>),
    ReadTimeout(Option<Duration>),
    ConnectTimeout(Option<Duration>),
    Charset(String),
    DocumentCharset(Option<String>),
    Post(Option<PostData>),
    MultipartPost(Option<Vec<MultipartField>>),
    RedirectLimit(u32),
    FollowLocation(bool),
    DocumentType(DocumentType),
    BodyMaxsize(Option<usize>),
    Nobody(bool),
    BodyInmemory(bool),
    BodyStorageDir(Option<PathBuf>),
    BodyStorageFilename(Option<String>),
    BodyStorageCreateDir(bool),
    UserAgent(Option<String>),
    UserAgentFile(Option<PathBuf>),
    Cookiefile(Option<PathBuf>),
    ReuseCookies(bool),
    CommonHeaders(Headers),
    ProxyAutoChange(bool),
}

impl ConfigOption {
    /// The option this override targets.
    #[must_use]
    pub fn key(&self) -> OptionKey {
        match self {
            Self::Method(_) => OptionKey::Method,
            Self::Url(_) => OptionKey::Url,
            Self::Proxy(_) => OptionKey::Proxy,
            Self::ProxyType(_) => OptionKey::ProxyType,
            Self::ProxyUserpwd(_) => OptionKey::ProxyUserpwd,
            Self::Headers(_) => OptionKey::Headers,
            Self::Cookies(_) => OptionKey::Cookies,
            Self::Timeout(_) => OptionKey::Timeout,
            Self::ReadTimeout(_) => OptionKey::ReadTimeout,
            Self::ConnectTimeout(_) => OptionKey::ConnectTimeout,
            Self::Charset(_) => OptionKey::Charset,
            Self::DocumentCharset(_) => OptionKey::DocumentCharset,
            Self::Post(_) => OptionKey::Post,
            Self::MultipartPost(_) => OptionKey::MultipartPost,
            Self::RedirectLimit(_) => OptionKey::RedirectLimit,
            Self::FollowLocation(_) => OptionKey::FollowLocation,
            Self::DocumentType(_) => OptionKey::DocumentType,
            Self::BodyMaxsize(_) => OptionKey::BodyMaxsize,
            Self::Nobody(_) => OptionKey::Nobody,
            Self::BodyInmemory(_) => OptionKey::BodyInmemory,
            Self::BodyStorageDir(_) => OptionKey::BodyStorageDir,
            Self::BodyStorageFilename(_) => OptionKey::BodyStorageFilename,
            Self::BodyStorageCreateDir(_) => OptionKey::BodyStorageCreateDir,
            Self::UserAgent(_) => OptionKey::UserAgent,
            Self::UserAgentFile(_) => OptionKey::UserAgentFile,
            Self::Cookiefile(_) => OptionKey::Cookiefile,
            Self::ReuseCookies(_) => OptionKey::ReuseCookies,
            Self::CommonHeaders(_) => OptionKey::CommonHeaders,
            Self::ProxyAutoChange(_) => OptionKey::ProxyAutoChange,
        }
    }

    /// Parses a `key`/`value` string pair.
    ///
    /// Scalars use their natural spelling (`true`, `15`, `2.5`, `socks5`);
    /// timeouts are seconds; an empty value clears optional options. Header
    /// and cookie maps, and multipart text fields, take a JSON object of
    /// strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for an unknown key or a value that does not
    /// parse as the key's type.
    pub fn parse(key: &str, value: &str) -> Result<Self, Error> {
        let key: OptionKey = key.parse()?;
        let raw = value.trim();
        let option = match key {
            OptionKey::Method => Self::Method(optional(raw).map(str::parse::<HttpMethod>).transpose()?),
            OptionKey::Url => Self::Url(raw.to_string()),
            OptionKey::Proxy => Self::Proxy(optional(raw).map(str::to_string)),
            OptionKey::ProxyType => Self::ProxyType(optional(raw).map(str::parse::<ProxyType>).transpose()?),
            OptionKey::ProxyUserpwd => Self::ProxyUserpwd(optional(raw).map(str::to_string)),
            OptionKey::Headers => Self::Headers(parse_string_map(key, raw)?.into_iter().collect()),
            OptionKey::Cookies => Self::Cookies(parse_string_map(key, raw)?),
            OptionKey::Timeout => Self::Timeout(parse_seconds(key, raw)?),
            OptionKey::ReadTimeout => Self::ReadTimeout(parse_seconds(key, raw)?),
            OptionKey::ConnectTimeout => Self::ConnectTimeout(parse_seconds(key, raw)?),
            OptionKey::Charset => Self::Charset(raw.to_string()),
            OptionKey::DocumentCharset => {
                Self::DocumentCharset(optional(raw).map(str::to_string))
            }
            OptionKey::Post => Self::Post(optional(value).map(|v| PostData::Text(v.to_string()))),
            OptionKey::MultipartPost => Self::MultipartPost(match optional(raw) {
                None => None,
                Some(_) => Some(
                    parse_string_map(key, raw)?
                        .into_iter()
                        .map(|(name, value)| MultipartField::text(name, value))
                        .collect(),
                ),
            }),
            OptionKey::RedirectLimit => Self::RedirectLimit(parse_number(key, raw)?),
            OptionKey::FollowLocation => Self::FollowLocation(parse_bool(key, raw)?),
            OptionKey::DocumentType => Self::DocumentType(raw.parse()?),
            OptionKey::BodyMaxsize => Self::BodyMaxsize(match optional(raw) {
                None => None,
                Some(v) => Some(parse_number(key, v)?),
            }),
            OptionKey::Nobody => Self::Nobody(parse_bool(key, raw)?),
            OptionKey::BodyInmemory => Self::BodyInmemory(parse_bool(key, raw)?),
            OptionKey::BodyStorageDir => Self::BodyStorageDir(optional(raw).map(PathBuf::from)),
            OptionKey::BodyStorageFilename => {
                Self::BodyStorageFilename(optional(raw).map(str::to_string))
            }
            OptionKey::BodyStorageCreateDir => Self::BodyStorageCreateDir(parse_bool(key, raw)?),
            OptionKey::UserAgent => Self::UserAgent(optional(raw).map(str::to_string)),
            OptionKey::UserAgentFile => Self::UserAgentFile(optional(raw).map(PathBuf::from)),
            OptionKey::Cookiefile => Self::Cookiefile(optional(raw).map(PathBuf::from)),
            OptionKey::ReuseCookies => Self::ReuseCookies(parse_bool(key, raw)?),
            OptionKey::CommonHeaders => {
                Self::CommonHeaders(parse_string_map(key, raw)?.into_iter().collect())
            }
            OptionKey::ProxyAutoChange => Self::ProxyAutoChange(parse_bool(key, raw)?),
        };
        Ok(option)
    }
}

fn optional(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_bool(key: OptionKey, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::usage(format!(
            "option {key} expects a boolean, got '{value}'"
        ))),
    }
}

fn parse_number<T: FromStr>(key: OptionKey, value: &str) -> Result<T, Error> {
    value.parse::<T>().map_err(|_| {
        Error::usage(format!(
            "option {key} expects a non-negative integer, got '{value}'"
        ))
    })
}

fn parse_seconds(key: OptionKey, value: &str) -> Result<Option<Duration>, Error> {
    let Some(value) = optional(value) else {
        return Ok(None);
    };
    let secs: f64 = value.parse().map_err(|_| {
        Error::usage(format!("option {key} expects seconds, got '{value}'"))
    })?;
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| Error::usage(format!("option {key} expects positive seconds, got '{value}'")))
}

fn parse_string_map(key: OptionKey, value: &str) -> Result<BTreeMap<String, String>, Error> {
    if value.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(value).map_err(|e| {
        Error::usage(format!(
            "option {key} expects a JSON object of strings: {e}"
        ))
    })
}
