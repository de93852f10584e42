//! reqwest-backed [`Transport`].
//!
//! Clients (connection pools) are cached per proxy and connect timeout and
//! reused across requests. Redirects are never followed here; the engine
//! owns redirect handling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderName, HeaderValue, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Proxy, redirect};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::error_mapping::{map_body_error, map_send_error};
use super::request::{ProxySettings, Request, RequestBody};
use super::{RequestLog, Transport};
use crate::config::{MultipartField, MultipartValue, join_url};
use crate::cookies::{CookieJar, parse_set_cookie};
use crate::document::{Body, Document};
use crate::error::{Error, TimeoutPhase};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    proxy_url: Option<String>,
    proxy_userpwd: Option<String>,
    connect_timeout: Duration,
}

impl PoolKey {
    fn for_request(request: &Request) -> Self {
        Self {
            proxy_url: request.proxy.as_ref().map(ProxySettings::proxy_url),
            proxy_userpwd: request.proxy.as_ref().and_then(|p| p.userpwd.clone()),
            connect_timeout: request.connect_timeout,
        }
    }
}

/// HTTP transport with cached connection pools.
#[derive(Debug, Default)]
pub struct HttpTransport {
    pools: Mutex<HashMap<PoolKey, Client>>,
    last_request: Mutex<Option<RequestLog>>,
}

impl HttpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary of the most recent dispatch, until the next `reset()`.
    #[must_use]
    pub fn last_request(&self) -> Option<RequestLog> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of cached connection pools.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn client_for(&self, request: &Request) -> Result<Client, Error> {
        let key = PoolKey::for_request(request);
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = pools.get(&key) {
            return Ok(client.clone());
        }
        let client = build_client(request.proxy.as_ref(), request.connect_timeout)
            .map_err(|e| Error::usage(format!("cannot build HTTP client: {e}")))?;
        debug!(proxy = ?key.proxy_url, "created connection pool");
        pools.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn dispatch(&self, request: &Request) -> Result<Document, Error> {
        let started = Instant::now();
        let url = request.url.as_str();
        let client = self.client_for(request)?;

        let mut builder = client.request(request.method.to_reqwest(), request.url.clone());
        for (name, value) in request.headers.iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::usage(format!("invalid header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::usage(format!("invalid value for header {name}")))?;
            builder = builder.header(name, value);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes.clone()),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields).await?),
        };

        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(RequestLog {
            method: request.method,
            url: url.to_string(),
            proxy: request.proxy.as_ref().map(|p| p.address.clone()),
        });

        let wait = head_wait(request, started.elapsed());
        let response = match tokio::time::timeout(wait, builder.send()).await {
            Ok(result) => result.map_err(|e| map_send_error(url, e, request.proxy.is_some()))?,
            Err(_) => return Err(Error::timeout(url, timeout_phase(request, started))),
        };

        let mut doc = Document::new(url, response.status().as_u16());
        doc.document_type = request.document_type;
        doc.head = format_head(&response);
        for (name, value) in response.headers() {
            if name == SET_COOKIE {
                continue;
            }
            let value = String::from_utf8_lossy(value.as_bytes());
            let combined = match doc.headers.get(name.as_str()) {
                Some(existing) => format!("{existing}, {value}"),
                None => value.into_owned(),
            };
            doc.headers.insert(name.as_str(), combined);
        }
        doc.cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| parse_set_cookie(&request.url, v))
            .collect::<CookieJar>();
        if doc.is_redirect()
            && let Some(location) = doc.location()
        {
            doc.url = join_url(url, location);
        }

        if request.wants_body() {
            let (body, truncated) = read_body(response, request, started).await?;
            doc.body = body;
            doc.truncated = truncated;
        } else if let Some(path) = &request.response_path {
            File::create(path).await.map_err(|e| Error::io(path, e))?;
            doc.body = Body::File(path.clone());
        }

        info!(
            status = doc.status,
            elapsed_ms = started.elapsed().as_millis(),
            "response received"
        );
        Ok(doc)
    }

    fn reset(&self) {
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn build_client(
    proxy: Option<&ProxySettings>,
    connect_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(redirect::Policy::none())
        .gzip(true);
    builder = match proxy {
        Some(settings) => {
            let mut proxy = Proxy::all(settings.proxy_url())?;
            if let Some((user, pass)) = settings.basic_auth() {
                proxy = proxy.basic_auth(user, pass);
            }
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };
    builder.build()
}

async fn build_form(fields: &[MultipartField]) -> Result<Form, Error> {
    let mut form = Form::new();
    for field in fields {
        let name = field.name.clone();
        form = match &field.value {
            MultipartValue::Text(text) => form.text(name, text.clone()),
            MultipartValue::Content {
                data,
                filename,
                content_type,
            } => form.part(
                name,
                file_part(data.clone(), filename.clone(), content_type.as_deref())?,
            ),
            MultipartValue::File {
                path,
                filename,
                content_type,
            } => {
                let data = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
                let filename = filename.clone().unwrap_or_else(|| file_name_of(path));
                form.part(name, file_part(data, filename, content_type.as_deref())?)
            }
        };
    }
    Ok(form)
}

fn file_part(data: Vec<u8>, filename: String, content_type: Option<&str>) -> Result<Part, Error> {
    let part = Part::bytes(data).file_name(filename);
    match content_type {
        Some(mime) => part
            .mime_str(mime)
            .map_err(|_| Error::usage(format!("invalid multipart content type: {mime}"))),
        None => Ok(part),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn format_head(response: &reqwest::Response) -> String {
    let status = response.status();
    let mut head = format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in response.headers() {
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(&String::from_utf8_lossy(value.as_bytes()));
        head.push_str("\r\n");
    }
    head
}

/// `Total` once the wall-clock budget is spent, `Read` otherwise.
/// Bound on waiting for the response head.
///
/// Covers connecting plus one read wait, so the client's connect timeout
/// fires first for slow connects. Never exceeds the remaining total budget.
fn head_wait(request: &Request, elapsed: Duration) -> Duration {
    let remaining = request.timeout.saturating_sub(elapsed);
    request
        .connect_timeout
        .saturating_add(request.read_timeout)
        .min(remaining)
}

fn timeout_phase(request: &Request, started: Instant) -> TimeoutPhase {
    if started.elapsed() >= request.timeout {
        TimeoutPhase::Total
    } else {
        TimeoutPhase::Read
    }
}

enum Sink {
    Memory(Vec<u8>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Sink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Self::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Self::File { writer, path } => writer
                .write_all(bytes)
                .await
                .map_err(|e| Error::io(path.as_path(), e)),
        }
    }

    async fn finish(self) -> Result<Body, Error> {
        match self {
            Self::Memory(buf) => Ok(Body::Memory(buf)),
            Self::File { mut writer, path } => {
                writer.flush().await.map_err(|e| Error::io(&path, e))?;
                Ok(Body::File(path))
            }
        }
    }
}

/// Streams the body into memory or the response file.
///
/// Each chunk wait is bounded by the read timeout and by what is left of the
/// total timeout. Reading stops once `body_maxsize` is exceeded.
async fn read_body(
    response: reqwest::Response,
    request: &Request,
    started: Instant,
) -> Result<(Body, bool), Error> {
    let url = request.url.as_str();
    let mut sink = match &request.response_path {
        Some(path) => {
            let file = File::create(path).await.map_err(|e| Error::io(path, e))?;
            Sink::File {
                writer: BufWriter::new(file),
                path: path.clone(),
            }
        }
        None => Sink::Memory(Vec::new()),
    };

    let result = stream_into(&mut sink, response, request, started).await;
    match result {
        Ok(truncated) => Ok((sink.finish().await?, truncated)),
        Err(e) => {
            if let Some(path) = &request.response_path {
                debug!(path = %path.display(), "removing partial body after error");
                let _ = tokio::fs::remove_file(path).await;
            }
            debug!(url, error = %e, "body read failed");
            Err(e)
        }
    }
}

async fn stream_into(
    sink: &mut Sink,
    response: reqwest::Response,
    request: &Request,
    started: Instant,
) -> Result<bool, Error> {
    let url = request.url.as_str();
    let mut stream = response.bytes_stream();
    let mut received: usize = 0;

    loop {
        let remaining = request.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(Error::timeout(url, TimeoutPhase::Total));
        }
        let wait = request.read_timeout.min(remaining);
        let next = match tokio::time::timeout(wait, stream.next()).await {
            Ok(next) => next,
            Err(_) => return Err(Error::timeout(url, timeout_phase(request, started))),
        };
        let Some(chunk) = next else {
            return Ok(false);
        };
        let chunk = chunk.map_err(|e| map_body_error(url, e))?;

        let take = match request.body_maxsize {
            Some(max) => chunk.len().min(max.saturating_sub(received)),
            None => chunk.len(),
        };
        sink.write(&chunk[..take]).await?;
        received += take;

        if take < chunk.len() {
            debug!(received, "body cap reached, truncating");
            return Ok(true);
        }
        if started.elapsed() > request.timeout {
            return Err(Error::timeout(url, TimeoutPhase::Total));
        }
    }
}
