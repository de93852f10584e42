//! Request engine.
//!
//! A [`Session`] drives each `request()` call through
//! `BUILDING -> DISPATCHING -> CLASSIFYING`, then loops back for a retry or
//! a redirect, or finishes with a document or an error:
//!
//! - BUILDING: resolve overrides, pick a proxy, build the request descriptor.
//! - DISPATCHING: run `request:pre` hooks, hand the descriptor to the
//!   transport. A transport error ends the call.
//! - CLASSIFYING: absorb cookies, consult `retry` hooks, follow redirects up
//!   to `redirect_limit`, otherwise run `response:post` hooks and return.
//!
//! One-shot options (`method`, `post`, `multipart_post`) are cleared after
//! every dispatch and whenever the call fails, so a later call never resends
//! a stale payload.

mod prepare;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, ConfigOption};
use crate::cookies::CookieManager;
use crate::document::{Body, Document};
use crate::error::Error;
use crate::hooks::{HookRegistry, RetryAction, RetryState};
use crate::proxy::{ProxySource, ProxyStrategy};
use crate::session::{SessionSnapshot, SessionState};
use crate::transport::{HttpTransport, Transport};
use crate::user_agent;


/// A scraping session: config, cookies, hooks and a transport.
///
/// Cloning a session deep-copies its config and cookies; the transport
/// (with its connection pools), hooks and proxy source are shared.
#[derive(Clone)]
pub struct Session {
    config: Config,
    cookies: CookieManager,
    hooks: HookRegistry,
    transport: Arc<dyn Transport>,
    proxies: Option<Arc<dyn ProxySource>>,
    proxy_strategy: ProxyStrategy,
    doc: Option<Document>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("cookies", &self.cookies)
            .field("hooks", &self.hooks)
            .field("proxy_strategy", &self.proxy_strategy)
            .field("has_doc", &self.doc.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session over [`HttpTransport`] with browser-like common headers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let config = Config {
            common_headers: user_agent::common_headers(),
            ..Config::default()
        };
        Self {
            config,
            cookies: CookieManager::new(),
            hooks: HookRegistry::new(),
            transport,
            proxies: None,
            proxy_strategy: ProxyStrategy::default(),
            doc: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieManager {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieManager {
        &mut self.cookies
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// The document returned by the last successful call.
    #[must_use]
    pub fn doc(&self) -> Option<&Document> {
        self.doc.as_ref()
    }

    /// Applies typed options without making a request.
    pub fn setup(&mut self, options: impl IntoIterator<Item = ConfigOption>) {
        self.config.resolve(options);
    }

    /// Applies string options without making a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for any unknown key or bad value; nothing is
    /// applied in that case.
    pub fn setup_pairs<K, V>(&mut self, pairs: &[(K, V)]) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.config.apply_pairs(pairs)
    }

    /// Installs a proxy pool used when `proxy_auto_change` is on.
    pub fn set_proxy_source(&mut self, source: Arc<dyn ProxySource>, strategy: ProxyStrategy) {
        self.proxies = Some(source);
        self.proxy_strategy = strategy;
    }

    /// Makes `url` absolute against the current `url` option.
    #[must_use]
    pub fn make_url_absolute(&self, url: &str) -> String {
        self.config.make_url_absolute(url)
    }

    /// Empties the cookie jar and the `cookies` option.
    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
        self.config.cookies.clear();
    }

    /// Switches the `proxy` options to a server from the proxy source.
    ///
    /// Does nothing when no source is set or it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] when the chosen server has no proxy type.
    pub fn change_proxy(&mut self, strategy: ProxyStrategy) -> Result<(), Error> {
        let server = match &self.proxies {
            Some(source) if source.size() > 0 => match strategy {
                ProxyStrategy::Random => source.get_random_server(),
                ProxyStrategy::RoundRobin => source.get_next_server(),
            },
            _ => {
                debug!("proxy list is empty");
                return Ok(());
            }
        };
        let Some(server) = server else {
            return Ok(());
        };
        let Some(proxy_type) = server.proxy_type else {
            return Err(Error::usage(format!(
                "cannot use proxy {} without a proxy type",
                server.address()
            )));
        };
        debug!(proxy = %server.address(), %proxy_type, "changed proxy");
        self.config.resolve([
            ConfigOption::Proxy(Some(server.address())),
            ConfigOption::ProxyUserpwd(server.userpwd()),
            ConfigOption::ProxyType(Some(proxy_type)),
        ]);
        Ok(())
    }

    /// Requests `url`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn go(&mut self, url: &str) -> Result<Document, Error> {
        self.request([ConfigOption::Url(url.to_string())]).await
    }

    /// Applies `overrides` and performs one request, following redirects and
    /// retries.
    ///
    /// # Errors
    ///
    /// Returns the classified [`Error`] of the first failure. Transport
    /// errors are never retried by the engine itself.
    #[instrument(skip_all)]
    pub async fn request(
        &mut self,
        overrides: impl IntoIterator<Item = ConfigOption>,
    ) -> Result<Document, Error> {
        let result = self.run(overrides).await;
        if let Err(e) = &result {
            self.config.reset_temporary_options();
            warn!(error = %e, "request failed");
        }
        result
    }

    async fn run(
        &mut self,
        overrides: impl IntoIterator<Item = ConfigOption>,
    ) -> Result<Document, Error> {
        self.config.resolve(overrides);
        let mut retry_state = RetryState::new();
        self.hooks.run_init_retry(&mut retry_state);
        let mut redirect_count: u32 = 0;

        'building: loop {
            if self.config.proxy_auto_change && self.proxies.is_some() {
                self.change_proxy(self.proxy_strategy)?;
            }
            let mut request = prepare::build_request(&self.config, &mut self.cookies)?;

            loop {
                self.hooks.run_request_pre(&mut request);
                if let Some(delay) = retry_state.backoff.take() {
                    debug!(delay_ms = delay.as_millis(), "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
                info!(method = %request.method, url = %request.url, "dispatching request");
                self.transport.reset();
                let dispatched = self.transport.dispatch(&request).await;
                self.config.reset_temporary_options();
                let mut doc = match dispatched {
                    Ok(doc) => doc,
                    Err(e) => {
                        if let Some(path) = &request.response_path {
                            self.discard_body_file(path);
                        }
                        return Err(e);
                    }
                };

                doc.timestamp = Some(Utc::now());
                doc.parse(request.charset_hint.as_deref());
                if self.config.reuse_cookies {
                    self.cookies.absorb(&doc.cookies);
                }

                if let RetryAction::Retry {
                    state,
                    request: next,
                } = self.hooks.run_retry(&retry_state, &request, &doc)
                {
                    debug!(status = doc.status, "retry requested by hook");
                    retry_state = state;
                    request = next;
                    continue;
                }

                if doc.is_redirect()
                    && self.config.follow_location
                    && let Some(location) = doc.location()
                {
                    redirect_count += 1;
                    if let Body::File(path) = &doc.body {
                        self.discard_body_file(path);
                    }
                    if redirect_count > self.config.redirect_limit {
                        return Err(Error::too_many_redirects(
                            request.url.as_str(),
                            self.config.redirect_limit,
                        ));
                    }
                    let target = request.url.join(location).map_err(|e| {
                        Error::invalid_response(
                            request.url.as_str(),
                            format!("bad Location header '{location}': {e}"),
                        )
                    })?;
                    debug!(from = %request.url, to = %target, redirect_count, "following redirect");
                    self.config.resolve([ConfigOption::Url(target.into())]);
                    continue 'building;
                }

                self.hooks.run_response_post(&request, &doc);
                self.doc = Some(doc.clone());
                return Ok(doc);
            }
        }
    }

    /// Removes a body file allocated for a hop whose document is not
    /// returned. Named files are left alone.
    fn discard_body_file(&self, path: &Path) {
        if self.config.body_storage_filename.is_some() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed superseded body file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "cannot remove body file"),
        }
    }

    /// Captures config and cookies.
    #[must_use]
    pub fn dump(&self) -> SessionSnapshot {
        SessionSnapshot {
            config: self.config.clone(),
            state: SessionState {
                cookiejar_cookies: self.cookies.export(),
            },
        }
    }

    /// Restores config and cookies from a snapshot.
    pub fn load(&mut self, snapshot: SessionSnapshot) {
        self.config = snapshot.config;
        self.cookies.import(snapshot.state.cookiejar_cookies);
    }
}
