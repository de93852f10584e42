//! CLI entry point for snare.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use snare_core::{
    Body, Config, ConfigOption, Document, PostData, ProxyList, ProxySource, ProxyStrategy,
    Session, SessionSnapshot, StatusRetry,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the response.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut session = Session::new();
    if let Some(path) = &args.session
        && path.exists()
    {
        let snapshot = SessionSnapshot::read_from(path)
            .with_context(|| format!("failed to load session {}", path.display()))?;
        session.load(snapshot);
        info!(path = %path.display(), "Loaded session");
    }

    session.setup_pairs(args.set.as_slice())?;

    if let Some(path) = &args.proxy_list {
        let list = ProxyList::from_file(path, Some(args.proxy_type))?;
        if list.size() == 0 {
            warn!(path = %path.display(), "Proxy list has no usable entries");
        }
        session.set_proxy_source(Arc::new(list), ProxyStrategy::RoundRobin);
    }

    if args.retries > 0 {
        session
            .hooks_mut()
            .register_retry_policy(StatusRetry::with_max_attempts(args.retries + 1));
    }

    let options = request_options(&args, session.config())?;
    let doc = session.request(options).await?;
    info!(status = doc.status, url = %doc.url, "Request complete");

    if let Some(path) = &args.cookie_jar {
        session.cookies().save(path)?;
        debug!(path = %path.display(), "Saved cookie jar");
    }
    if let Some(path) = &args.session {
        session.dump().write_to(path)?;
    }

    print_document(&doc, args.include)
}

/// Translates flags into option overrides. Headers and cookies extend what
/// the session already carries.
fn request_options(args: &Args, current: &Config) -> Result<Vec<ConfigOption>> {
    let mut options = vec![ConfigOption::Url(args.url.clone())];

    if let Some(method) = args.method {
        options.push(ConfigOption::Method(Some(method)));
    }
    if let Some(data) = &args.data {
        options.push(ConfigOption::Post(Some(PostData::Text(data.clone()))));
    }
    if !args.headers.is_empty() {
        let mut headers = current.headers.clone();
        for (name, value) in &args.headers {
            headers.insert(name, value);
        }
        options.push(ConfigOption::Headers(headers));
    }
    if !args.cookies.is_empty() {
        let mut cookies = current.cookies.clone();
        cookies.extend(args.cookies.iter().cloned());
        options.push(ConfigOption::Cookies(cookies));
    }
    if let Some(path) = &args.cookie_file {
        options.push(ConfigOption::Cookiefile(Some(path.clone())));
    }
    if let Some(proxy) = &args.proxy {
        options.push(ConfigOption::Proxy(Some(proxy.clone())));
        options.push(ConfigOption::ProxyType(Some(args.proxy_type)));
        options.push(ConfigOption::ProxyUserpwd(args.proxy_auth.clone()));
    }
    if let Some(secs) = args.timeout {
        options.push(ConfigOption::Timeout(Some(Duration::from_secs(secs))));
    }
    if let Some(secs) = args.connect_timeout {
        options.push(ConfigOption::ConnectTimeout(Some(Duration::from_secs(secs))));
    }
    if let Some(limit) = args.max_redirects {
        options.push(ConfigOption::RedirectLimit(limit));
    }
    if args.no_follow {
        options.push(ConfigOption::FollowLocation(false));
    }
    if let Some(max) = args.max_body {
        options.push(ConfigOption::BodyMaxsize(Some(max)));
    }
    if let Some(output) = &args.output {
        let Some(filename) = output.file_name().and_then(|name| name.to_str()) else {
            bail!("output path {} has no file name", output.display());
        };
        let dir = output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        options.push(ConfigOption::BodyInmemory(false));
        options.push(ConfigOption::BodyStorageDir(Some(dir.to_path_buf())));
        options.push(ConfigOption::BodyStorageFilename(Some(filename.to_string())));
    }
    Ok(options)
}

fn print_document(doc: &Document, include: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if include {
        writeln!(stdout, "HTTP {}", doc.status)?;
        for (name, value) in doc.headers.iter() {
            writeln!(stdout, "{name}: {value}")?;
        }
        writeln!(stdout)?;
    }
    if doc.truncated {
        warn!("Body truncated at the size cap");
    }
    match &doc.body {
        Body::Memory(bytes) => stdout.write_all(bytes)?,
        Body::File(path) => info!(path = %path.display(), "Body saved"),
    }
    stdout.flush()?;
    Ok(())
}
