//! Browser-like request identity: `User-Agent` strings and common headers.

use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::Headers;
use crate::error::Error;

/// Desktop browser identities a session may present.
const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:130.0) Gecko/20100101 Firefox/130.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:130.0) Gecko/20100101 Firefox/130.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36 Edg/128.0.0.0",
];

/// Fallback when the identity list is empty.
fn tool_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("snare/{version}")
}

/// A random browser `User-Agent`.
#[must_use]
pub fn default_user_agent() -> String {
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .map_or_else(tool_user_agent, |ua| (*ua).to_string())
}

/// Browser-like headers sent with every request unless overridden.
///
/// The q-values are randomized per call so sessions do not share an exact
/// fingerprint.
#[must_use]
pub fn common_headers() -> Headers {
    let mut rng = rand::thread_rng();
    let mut headers = Headers::new();
    headers.insert("Accept", format!("*/*;q=0.{}", rng.gen_range(2..=5)));
    headers.insert(
        "Accept-Language",
        format!("en-us,en;q=0.{}", rng.gen_range(5..=9)),
    );
    headers.insert(
        "Accept-Charset",
        format!("utf-8,windows-1251;q=0.7,*;q=0.{}", rng.gen_range(5..=7)),
    );
    headers.insert("Keep-Alive", "300");
    headers
}

/// A random non-empty line of `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and
/// [`Error::Usage`] when it has no non-empty line.
pub fn random_line(path: &Path) -> Result<String, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines
        .choose(&mut rand::thread_rng())
        .map(|line| (*line).to_string())
        .ok_or_else(|| Error::usage(format!("no lines in {}", path.display())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_is_browser_like() {
        let ua = default_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"), "unexpected UA: {ua}");
        assert!(BROWSER_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn test_common_headers_ranges() {
        for _ in 0..20 {
            let headers = common_headers();
            let accept = headers.get("Accept").unwrap();
            let q: u32 = accept.strip_prefix("*/*;q=0.").unwrap().parse().unwrap();
            assert!((2..=5).contains(&q), "Accept q out of range: {accept}");
            let lang = headers.get("Accept-Language").unwrap();
            assert!(lang.starts_with("en-us,en;q=0."));
            assert_eq!(headers.get("keep-alive"), Some("300"));
        }
    }

    #[test]
    fn test_random_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.txt");
        std::fs::write(&path, "\n  agent-one  \n\nagent-two\n").unwrap();
        for _ in 0..10 {
            let line = random_line(&path).unwrap();
            assert!(line == "agent-one" || line == "agent-two");
        }

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n\n").unwrap();
        assert!(matches!(random_line(&empty), Err(Error::Usage { .. })));
        assert!(matches!(
            random_line(&dir.path().join("missing.txt")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_tool_user_agent_has_version() {
        assert_eq!(
            tool_user_agent(),
            format!("snare/{}", env!("CARGO_PKG_VERSION"))
        );
    }
}
