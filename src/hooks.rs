//! Extension hook pipeline.
//!
//! Four hook points, each an ordered list of observers:
//! - `init-retry` ([`InitRetryHook`]): seeds the per-call [`RetryState`].
//! - `request:pre` ([`RequestPreHook`]): may rewrite each outgoing request.
//! - `retry` ([`RetryHook`]): may ask for another attempt; the first
//!   [`RetryAction::Retry`] wins.
//! - `response:post` ([`ResponsePostHook`]): observes the terminal document.
//!
//! Closures with the matching signature implement the traits directly.
//!
//! # Example
//!
//! ```
//! use snare_core::hooks::{HookRegistry, RetryAction, RetryState};
//! use snare_core::transport::Request;
//! use snare_core::document::Document;
//!
//! let mut hooks = HookRegistry::new();
//! hooks.register_init_retry(|state: &mut RetryState| state.set("tries", 0));
//! hooks.register_retry(|state: &RetryState, request: &Request, doc: &Document| {
//!     if doc.status == 503 && state.get("tries") < 2 {
//!         let mut next = state.clone();
//!         next.increment("tries");
//!         RetryAction::Retry { state: next, request: request.clone() }
//!     } else {
//!         RetryAction::NoAction
//!     }
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::document::Document;
use crate::transport::Request;

/// Per-call retry bookkeeping.
///
/// Created when `request()` starts, seeded by `init-retry` hooks and dropped
/// when the call returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    counters: HashMap<String, u32>,
    /// Delay the engine waits before the next attempt.
    pub backoff: Option<Duration>,
}

impl RetryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter value, `0` when unset.
    #[must_use]
    pub fn get(&self, name: &str) -> u32 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: &str, value: u32) {
        self.counters.insert(name.to_string(), value);
    }

    /// Increments a counter and returns the new value.
    pub fn increment(&mut self, name: &str) -> u32 {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }
}

/// Outcome of a `retry` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryAction {
    NoAction,
    /// Dispatch `request` again with `state` replacing the current state.
    Retry { state: RetryState, request: Request },
}

pub trait InitRetryHook: Send + Sync {
    fn init_retry(&self, state: &mut RetryState);
}

pub trait RequestPreHook: Send + Sync {
    fn before_request(&self, request: &mut Request);
}

pub trait RetryHook: Send + Sync {
    fn check(&self, state: &RetryState, request: &Request, doc: &Document) -> RetryAction;
}

pub trait ResponsePostHook: Send + Sync {
    fn after_response(&self, request: &Request, doc: &Document);
}

impl<F> InitRetryHook for F
where
    F: Fn(&mut RetryState) + Send + Sync,
{
    fn init_retry(&self, state: &mut RetryState) {
        self(state);
    }
}

impl<F> RequestPreHook for F
where
    F: Fn(&mut Request) + Send + Sync,
{
    fn before_request(&self, request: &mut Request) {
        self(request);
    }
}

impl<F> RetryHook for F
where
    F: Fn(&RetryState, &Request, &Document) -> RetryAction + Send + Sync,
{
    fn check(&self, state: &RetryState, request: &Request, doc: &Document) -> RetryAction {
        self(state, request, doc)
    }
}

impl<F> ResponsePostHook for F
where
    F: Fn(&Request, &Document) + Send + Sync,
{
    fn after_response(&self, request: &Request, doc: &Document) {
        self(request, doc);
    }
}

/// Registered hooks, in registration order per point.
#[derive(Clone, Default)]
pub struct HookRegistry {
    init_retry: Vec<Arc<dyn InitRetryHook>>,
    request_pre: Vec<Arc<dyn RequestPreHook>>,
    retry: Vec<Arc<dyn RetryHook>>,
    response_post: Vec<Arc<dyn ResponsePostHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("init_retry", &self.init_retry.len())
            .field("request_pre", &self.request_pre.len())
            .field("retry", &self.retry.len())
            .field("response_post", &self.response_post.len())
            .finish()
    }
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_init_retry(&mut self, hook: impl InitRetryHook + 'static) {
        self.init_retry.push(Arc::new(hook));
    }

    pub fn register_request_pre(&mut self, hook: impl RequestPreHook + 'static) {
        self.request_pre.push(Arc::new(hook));
    }

    pub fn register_retry(&mut self, hook: impl RetryHook + 'static) {
        self.retry.push(Arc::new(hook));
    }

    pub fn register_response_post(&mut self, hook: impl ResponsePostHook + 'static) {
        self.response_post.push(Arc::new(hook));
    }

    /// Registers a hook that takes part in both `init-retry` and `retry`.
    pub fn register_retry_policy<H>(&mut self, hook: H)
    where
        H: InitRetryHook + RetryHook + 'static,
    {
        let hook = Arc::new(hook);
        self.init_retry.push(hook.clone());
        self.retry.push(hook);
    }

    pub(crate) fn run_init_retry(&self, state: &mut RetryState) {
        for hook in &self.init_retry {
            hook.init_retry(state);
        }
    }

    pub(crate) fn run_request_pre(&self, request: &mut Request) {
        for hook in &self.request_pre {
            hook.before_request(request);
        }
    }

    pub(crate) fn run_retry(&self, state: &RetryState, request: &Request, doc: &Document) -> RetryAction {
        for hook in &self.retry {
            if let action @ RetryAction::Retry { .. } = hook.check(state, request, doc) {
                return action;
            }
        }
        RetryAction::NoAction
    }

    pub(crate) fn run_response_post(&self, request: &Request, doc: &Document) {
        for hook in &self.response_post {
            hook.after_response(request, doc);
        }
    }
}

/// Counter used by [`StatusRetry`].
pub const STATUS_RETRY_COUNTER: &str = "status_retry";

/// Default maximum attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Retries transient HTTP statuses (408, 429, 5xx) with exponential
/// backoff plus jitter.
///
/// Delay before retry `n` is `min(base * multiplier^(n-1), max_delay) +
/// jitter`. A numeric `Retry-After` header on 429/503 replaces the computed
/// delay, still capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct StatusRetry {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    max_jitter: Duration,
}

impl Default for StatusRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl StatusRetry {
    /// A policy allowing `max_attempts` dispatches (at least one).
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration, max_jitter: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self.max_jitter = max_jitter;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * self.backoff_multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    fn retry_after(&self, doc: &Document) -> Option<Duration> {
        if !matches!(doc.status, 429 | 503) {
            return None;
        }
        let secs = doc.header("Retry-After")?.trim().parse::<u64>().ok()?;
        Some(Duration::from_secs(secs).min(self.max_delay))
    }
}

/// Statuses worth another attempt.
#[must_use]
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

impl InitRetryHook for StatusRetry {
    fn init_retry(&self, state: &mut RetryState) {
        state.set(STATUS_RETRY_COUNTER, 0);
    }
}

impl RetryHook for StatusRetry {
    fn check(&self, state: &RetryState, request: &Request, doc: &Document) -> RetryAction {
        if !is_transient_status(doc.status) {
            return RetryAction::NoAction;
        }
        let attempt = state.get(STATUS_RETRY_COUNTER) + 1;
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, status = doc.status, "max attempts reached");
            return RetryAction::NoAction;
        }
        let delay = self
            .retry_after(doc)
            .unwrap_or_else(|| self.calculate_delay(attempt));
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            status = doc.status,
            "will retry"
        );
        let mut next = state.clone();
        next.set(STATUS_RETRY_COUNTER, attempt);
        next.backoff = Some(delay);
        RetryAction::Retry {
            state: next,
            request: request.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::HttpMethod;
    use std::sync::Mutex;
    use url::Url;

    fn request() -> Request {
        Request::new(HttpMethod::Get, Url::parse("http://example.com/").unwrap())
    }

    fn doc(status: u16) -> Document {
        Document::new("http://example.com/", status)
    }

    #[test]
    fn test_retry_state_counters() {
        let mut state = RetryState::new();
        assert_eq!(state.get("x"), 0);
        assert_eq!(state.increment("x"), 1);
        assert_eq!(state.increment("x"), 2);
        state.set("x", 7);
        assert_eq!(state.get("x"), 7);
    }

    #[test]
    fn test_first_retry_wins() {
        let mut hooks = HookRegistry::new();
        hooks.register_retry(|_: &RetryState, _: &Request, _: &Document| RetryAction::NoAction);
        hooks.register_retry(|state: &RetryState, req: &Request, _: &Document| {
            let mut next = state.clone();
            next.set("winner", 1);
            RetryAction::Retry {
                state: next,
                request: req.clone(),
            }
        });
        hooks.register_retry(|state: &RetryState, req: &Request, _: &Document| {
            let mut next = state.clone();
            next.set("winner", 2);
            RetryAction::Retry {
                state: next,
                request: req.clone(),
            }
        });

        match hooks.run_retry(&RetryState::new(), &request(), &doc(200)) {
            RetryAction::Retry { state, .. } => assert_eq!(state.get("winner"), 1),
            RetryAction::NoAction => panic!("expected retry"),
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            hooks.register_request_pre(move |req: &mut Request| {
                req.headers.insert("X-Order", tag);
                seen.lock().unwrap().push(tag);
            });
        }
        let mut req = request();
        hooks.run_request_pre(&mut req);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(req.headers.get("x-order"), Some("c"));
    }

    #[test]
    fn test_status_retry_bounds_attempts() {
        let policy = StatusRetry::with_max_attempts(3).with_delays(
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        let mut state = RetryState::new();
        policy.init_retry(&mut state);

        let mut delays = Vec::new();
        loop {
            match policy.check(&state, &request(), &doc(503)) {
                RetryAction::Retry { state: next, .. } => {
                    delays.push(next.backoff.unwrap());
                    state = next;
                }
                RetryAction::NoAction => break,
            }
        }
        assert_eq!(delays, vec![Duration::from_millis(10), Duration::from_millis(20)]);
        assert_eq!(state.get(STATUS_RETRY_COUNTER), 2);
    }

    #[test]
    fn test_status_retry_ignores_permanent_statuses() {
        let policy = StatusRetry::default();
        for status in [200, 301, 404, 410] {
            assert_eq!(
                policy.check(&RetryState::new(), &request(), &doc(status)),
                RetryAction::NoAction
            );
        }
    }

    #[test]
    fn test_status_retry_honors_retry_after() {
        let policy = StatusRetry::with_max_attempts(2).with_delays(
            Duration::from_millis(1),
            Duration::from_secs(5),
            Duration::ZERO,
        );
        let mut limited = doc(429);
        limited.headers.insert("Retry-After", "2");
        match policy.check(&RetryState::new(), &request(), &limited) {
            RetryAction::Retry { state, .. } => {
                assert_eq!(state.backoff, Some(Duration::from_secs(2)));
            }
            RetryAction::NoAction => panic!("expected retry"),
        }
    }

    #[test]
    fn test_jitter_within_bounds() {
        let policy = StatusRetry::default();
        for _ in 0..100 {
            let delay = policy.calculate_delay(1);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(408));
        assert!(is_transient_status(429));
        assert!(is_transient_status(502));
        assert!(!is_transient_status(404));
        assert!(!is_transient_status(200));
    }
}
