//! BUILDING: turns the effective config into a request descriptor.

use tracing::{debug, instrument};
use url::Url;

use crate::config::{Config, HttpMethod};
use crate::cookies::CookieManager;
use crate::error::Error;
use crate::storage;
use crate::transport::{ProxySettings, Request, RequestBody};
use crate::user_agent;

/// Builds the descriptor for the next attempt.
///
/// Loads `cookiefile` and session cookies into `cookies` as a side effect.
///
/// # Errors
///
/// - [`Error::Usage`] when no URL is set, a body-bearing method has no
///   payload, the proxy has no type, or body storage is misconfigured.
/// - [`Error::InvalidUrl`] when the URL does not normalize.
/// - [`Error::Io`] when the cookie file, user agent file or body file cannot
///   be used.
#[instrument(level = "debug", skip_all)]
pub(crate) fn build_request(config: &Config, cookies: &mut CookieManager) -> Result<Request, Error> {
    let raw_url = config
        .url
        .as_deref()
        .ok_or_else(|| Error::usage("no url configured for request"))?;
    let url = normalize_url(raw_url)?;

    let has_payload = config.post.is_some() || config.multipart_post.is_some();
    let method = config.method.unwrap_or(if has_payload {
        HttpMethod::Post
    } else {
        HttpMethod::Get
    });
    if method.requires_payload() && !has_payload {
        return Err(Error::usage(format!(
            "{method} request requires post or multipart_post"
        )));
    }

    let mut request = Request::new(method, url);
    request.timeout = config.effective_timeout();
    request.read_timeout = config.effective_read_timeout();
    request.connect_timeout = config.effective_connect_timeout();
    request.body_maxsize = config.body_maxsize;
    request.nobody = config.nobody;
    request.charset_hint.clone_from(&config.document_charset);
    request.document_type = config.document_type;
    request.proxy = proxy_settings(config)?;

    let mut headers = config.common_headers.clone();
    headers.merge(&config.headers);
    if !headers.contains("User-Agent") {
        headers.insert("User-Agent", resolve_user_agent(config)?);
    }

    if let Some(fields) = &config.multipart_post {
        request.body = RequestBody::Multipart(fields.clone());
    } else if let Some(post) = &config.post {
        request.body = RequestBody::Bytes(post.encode(&config.charset)?);
        if let Some(content_type) = post.implied_content_type()
            && !headers.contains("Content-Type")
        {
            headers.insert("Content-Type", content_type);
        }
    }

    if let Some(path) = &config.cookiefile {
        cookies.load(path)?;
    }
    cookies.apply_session_cookies(&request.url, &config.cookies);
    if let Some(cookie_header) = cookies.cookie_header_for(&request.url, &headers) {
        headers.insert("Cookie", cookie_header);
    }
    request.headers = headers;

    if !config.body_inmemory {
        request.response_path = Some(storage::allocate_body_path(
            config.body_storage_dir.as_deref(),
            config.body_storage_filename.as_deref(),
            config.body_storage_create_dir,
        )?);
    }

    debug!(method = %request.method, url = %request.url, "built request");
    Ok(request)
}

/// Parses `raw`, assuming `http://` when the scheme is missing.
pub(crate) fn normalize_url(raw: &str) -> Result<Url, Error> {
    let raw = raw.trim();
    let parsed = match Url::parse(raw) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{raw}")),
        other => other,
    }
    .map_err(|e| Error::invalid_url(raw, e))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::invalid_url(
            raw,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_url(raw, "missing host"));
    }
    Ok(parsed)
}

fn proxy_settings(config: &Config) -> Result<Option<ProxySettings>, Error> {
    let Some(address) = &config.proxy else {
        return Ok(None);
    };
    let proxy_type = config
        .proxy_type
        .ok_or_else(|| Error::usage(format!("proxy {address} has no proxy_type")))?;
    Ok(Some(ProxySettings {
        address: address.clone(),
        proxy_type,
        userpwd: config.proxy_userpwd.clone(),
    }))
}

fn resolve_user_agent(config: &Config) -> Result<String, Error> {
    if let Some(ua) = &config.user_agent {
        return Ok(ua.clone());
    }
    match &config.user_agent_file {
        Some(path) => user_agent::random_line(path),
        None => Ok(user_agent::default_user_agent()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::{ConfigOption, MultipartField, PostData, ProxyType};

    fn config_for(url: &str) -> Config {
        let mut config = Config::default();
        config.resolve([ConfigOption::Url(url.to_string())]);
        config
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("example.com/path").unwrap().as_str(),
            "http://example.com/path"
        );
        assert!(matches!(
            normalize_url("ftp://example.com/"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            normalize_url("http://"),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_missing_url_is_usage_error() {
        let result = build_request(&Config::default(), &mut CookieManager::new());
        assert!(matches!(result, Err(Error::Usage { .. })));
    }

    #[test]
    fn test_post_without_payload_is_usage_error() {
        let mut config = config_for("http://example.com/");
        config.method = Some(HttpMethod::Post);
        let result = build_request(&config, &mut CookieManager::new());
        assert!(matches!(result, Err(Error::Usage { .. })));
    }

    #[test]
    fn test_payload_implies_post_and_content_type() {
        let mut config = config_for("http://example.com/");
        config.post = Some(PostData::Form(vec![("a".into(), "1".into())]));
        let request = build_request(&config, &mut CookieManager::new()).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, RequestBody::Bytes(b"a=1".to_vec()));
        assert_eq!(
            request.headers.get("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_multipart_wins_over_post() {
        let mut config = config_for("http://example.com/");
        config.post = Some(PostData::Text("ignored".into()));
        config.multipart_post = Some(vec![MultipartField::text("f", "v")]);
        let request = build_request(&config, &mut CookieManager::new()).unwrap();
        assert!(matches!(request.body, RequestBody::Multipart(_)));
    }

    #[test]
    fn test_proxy_requires_type() {
        let mut config = config_for("http://example.com/");
        config.proxy = Some("127.0.0.1:3128".into());
        assert!(matches!(
            build_request(&config, &mut CookieManager::new()),
            Err(Error::Usage { .. })
        ));
        config.proxy_type = Some(ProxyType::Http);
        let request = build_request(&config, &mut CookieManager::new()).unwrap();
        assert_eq!(request.proxy.unwrap().address, "127.0.0.1:3128");
    }

    #[test]
    fn test_headers_merge_and_user_agent() {
        let mut config = config_for("http://example.com/");
        config.common_headers = [("Accept", "*/*"), ("X-Common", "1")].into_iter().collect();
        config.headers = [("accept", "text/html")].into_iter().collect();
        config.user_agent = Some("custom-agent".into());
        let request = build_request(&config, &mut CookieManager::new()).unwrap();
        assert_eq!(request.headers.get("Accept"), Some("text/html"));
        assert_eq!(request.headers.get("X-Common"), Some("1"));
        assert_eq!(request.headers.get("User-Agent"), Some("custom-agent"));
    }

    #[test]
    fn test_session_cookies_and_explicit_header() {
        let mut config = config_for("http://www.example.com/");
        config.cookies = BTreeMap::from([("sid".to_string(), "1".to_string())]);
        let mut cookies = CookieManager::new();
        let request = build_request(&config, &mut cookies).unwrap();
        assert_eq!(request.headers.get("Cookie"), Some("sid=1"));
        assert_eq!(cookies.jar().get("sid").unwrap().domain, "example.com");

        config.headers = [("Cookie", "manual=1")].into_iter().collect();
        let request = build_request(&config, &mut cookies).unwrap();
        assert_eq!(request.headers.get("Cookie"), Some("manual=1"));
    }

    #[test]
    fn test_timeouts_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for("http://example.com/");
        config.timeout = Some(std::time::Duration::from_secs(7));
        config.body_inmemory = false;
        config.body_storage_dir = Some(dir.path().to_path_buf());
        config.body_storage_filename = Some("page.html".into());
        let request = build_request(&config, &mut CookieManager::new()).unwrap();
        assert_eq!(request.timeout, std::time::Duration::from_secs(7));
        assert_eq!(request.read_timeout, std::time::Duration::from_secs(7));
        assert_eq!(request.response_path, Some(dir.path().join("page.html")));
    }
}
