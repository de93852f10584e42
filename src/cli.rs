//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use snare_core::{HttpMethod, ProxyType};

/// Fetch a URL through the snare request engine.
///
/// Options map onto session config; `--set key=value` reaches any option by
/// name.
#[derive(Parser, Debug)]
#[command(name = "snare")]
#[command(author, version, about)]
pub struct Args {
    /// URL to request (scheme defaults to http://)
    pub url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD)
    #[arg(short = 'X', long)]
    pub method: Option<HttpMethod>,

    /// Request body sent as-is (implies POST)
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header, e.g. "Accept: text/html" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Session cookie, e.g. "sid=abc" (repeatable)
    #[arg(short = 'b', long = "cookie", value_parser = parse_key_value)]
    pub cookies: Vec<(String, String)>,

    /// Netscape cookie file loaded before the request
    #[arg(long)]
    pub cookie_file: Option<PathBuf>,

    /// Write the cookie jar to this Netscape file after the request
    #[arg(long)]
    pub cookie_jar: Option<PathBuf>,

    /// Proxy address (host:port)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Proxy type (http, https, socks4, socks5)
    #[arg(long, default_value = "http")]
    pub proxy_type: ProxyType,

    /// Proxy credentials (user:password)
    #[arg(long)]
    pub proxy_auth: Option<String>,

    /// File of proxies to rotate through, one per line
    #[arg(long, conflicts_with = "proxy")]
    pub proxy_list: Option<PathBuf>,

    /// Total timeout in seconds
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Maximum redirects to follow
    #[arg(long)]
    pub max_redirects: Option<u32>,

    /// Do not follow redirects
    #[arg(long)]
    pub no_follow: bool,

    /// Stop reading the body after this many bytes
    #[arg(long)]
    pub max_body: Option<usize>,

    /// Store the body in this file instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Set any option by key, e.g. --set document_charset=cp1251 (repeatable)
    #[arg(long = "set", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Session snapshot to load before and save after the request
    #[arg(long)]
    pub session: Option<PathBuf>,

    /// Retry transient statuses (408, 429, 5xx) this many times
    #[arg(short = 'r', long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retries: u32,

    /// Print the status line and response headers before the body
    #[arg(short, long)]
    pub include: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected 'key=value', got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["snare", "example.com"]).unwrap();
        assert_eq!(args.url, "example.com");
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.retries, 0);
        assert_eq!(args.proxy_type, ProxyType::Http);
        assert!(args.method.is_none());
        assert!(!args.include);
    }

    #[test]
    fn test_cli_url_is_required() {
        let result = Args::try_parse_from(["snare"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["snare", "-vv", "example.com"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["snare", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_method_and_data() {
        let args =
            Args::try_parse_from(["snare", "-X", "put", "-d", "a=1", "example.com"]).unwrap();
        assert_eq!(args.method, Some(HttpMethod::Put));
        assert_eq!(args.data.as_deref(), Some("a=1"));

        let result = Args::try_parse_from(["snare", "-X", "FETCH", "example.com"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_repeatable_headers_and_cookies() {
        let args = Args::try_parse_from([
            "snare",
            "-H",
            "Accept: text/html",
            "-H",
            "X-Token:abc",
            "-b",
            "sid=1",
            "example.com",
        ])
        .unwrap();
        assert_eq!(
            args.headers,
            vec![
                ("Accept".to_string(), "text/html".to_string()),
                ("X-Token".to_string(), "abc".to_string())
            ]
        );
        assert_eq!(args.cookies, vec![("sid".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_cli_malformed_header_rejected() {
        let result = Args::try_parse_from(["snare", "-H", "no-colon", "example.com"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_set_pairs_keep_equals_in_value() {
        let args =
            Args::try_parse_from(["snare", "--set", "url=http://x/?a=b", "example.com"]).unwrap();
        assert_eq!(
            args.set,
            vec![("url".to_string(), "http://x/?a=b".to_string())]
        );
    }

    #[test]
    fn test_cli_proxy_type_parsed() {
        let args = Args::try_parse_from([
            "snare",
            "--proxy",
            "127.0.0.1:1080",
            "--proxy-type",
            "socks5",
            "example.com",
        ])
        .unwrap();
        assert_eq!(args.proxy_type, ProxyType::Socks5);
    }

    #[test]
    fn test_cli_proxy_conflicts_with_proxy_list() {
        let result = Args::try_parse_from([
            "snare",
            "--proxy",
            "127.0.0.1:1080",
            "--proxy-list",
            "proxies.txt",
            "example.com",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_retries_out_of_range() {
        let result = Args::try_parse_from(["snare", "-r", "11", "example.com"]);
        assert!(result.is_err());
    }
}
