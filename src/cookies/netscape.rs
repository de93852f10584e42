//! Netscape cookie file codec.
//!
//! Each non-comment, non-blank line holds 7 TAB-separated fields:
//! `domain`, `include_subdomains`, `path`, `secure`, `expires`, `name`,
//! `value`. An expiry of `0` marks a session cookie.

use std::io::{self, BufRead, Write};

use tracing::{debug, instrument, warn};

use super::jar::{Cookie, normalize_domain};

/// First line written by [`write_netscape_cookies`].
pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// A rejected line.
#[derive(Debug, thiserror::Error)]
#[error("line {line_number}: {reason} (got: {content})")]
pub struct InvalidCookieLine {
    /// 1-based line number.
    pub line_number: usize,
    /// The offending line with its value redacted.
    pub content: String,
    /// What was wrong.
    pub reason: String,
}

/// Cookies parsed from a file plus the lines that were skipped.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub cookies: Vec<Cookie>,
    pub warnings: Vec<InvalidCookieLine>,
}

/// Parses a Netscape cookie file.
///
/// Malformed lines are skipped, logged, and reported in
/// [`ParseResult::warnings`].
///
/// # Errors
///
/// Returns the underlying IO error when the reader fails.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> io::Result<ParseResult> {
    let mut result = ParseResult::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line?;
        let line = line.trim_end();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_cookie_line(line, line_number) {
            Ok(cookie) => {
                debug!(
                    line = line_number,
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "parsed cookie"
                );
                result.cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e.reason, "skipping malformed cookie line");
                result.warnings.push(e);
            }
        }
    }

    Ok(result)
}

/// Writes cookies in Netscape format, header first.
///
/// # Errors
///
/// Returns the underlying IO error when the writer fails.
pub fn write_netscape_cookies<'a>(
    mut writer: impl Write,
    cookies: impl IntoIterator<Item = &'a Cookie>,
) -> io::Result<()> {
    writeln!(writer, "{NETSCAPE_HEADER}")?;
    for cookie in cookies {
        let domain = if cookie.include_subdomains {
            format!(".{}", cookie.domain)
        } else {
            cookie.domain.clone()
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            domain,
            bool_field(cookie.include_subdomains),
            cookie.path,
            bool_field(cookie.secure),
            cookie.expires.unwrap_or(0),
            cookie.name,
            cookie.value()
        )?;
    }
    writer.flush()
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<Cookie, InvalidCookieLine> {
    let invalid = |reason: String| InvalidCookieLine {
        line_number,
        content: redact_line_for_error(line),
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 7 {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    }

    let include_subdomains = parse_bool_field(fields[1], "include_subdomains").map_err(&invalid)?;
    let secure = parse_bool_field(fields[3], "secure").map_err(&invalid)?;
    let expires = fields[4].parse::<u64>().map_err(|_| {
        invalid(format!(
            "expires field must be a non-negative integer, got '{}'",
            fields[4]
        ))
    })?;

    let (domain, _) = normalize_domain(fields[0]);
    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if fields[5].is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    let mut cookie = Cookie::new(fields[5], fields[6], &domain)
        .with_path(fields[2])
        .with_expires((expires > 0).then_some(expires))
        .with_secure(secure);
    if !include_subdomains {
        cookie = cookie.host_only();
    }
    Ok(cookie)
}

fn parse_bool_field(value: &str, field_name: &str) -> Result<bool, String> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(format!("{field_name} field must be TRUE or FALSE, got '{value}'")),
    }
}

fn bool_field(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Redacts the value (7th field) so errors can be logged safely.
fn redact_line_for_error(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        let mut redacted = fields[..6].join("\t");
        redacted.push_str("\t[REDACTED]");
        redacted
    } else {
        line.to_string()
    }
}
