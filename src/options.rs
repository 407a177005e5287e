use std::time::Duration;

use reqwest::{header::HeaderMap, Method};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 8_000;
/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: usize = 2;
/// Default base backoff in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Configures per-attempt timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Per-attempt timeout in milliseconds. Zero falls back to the default.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (doubles after every failed attempt).
    pub retry_backoff_ms: u64,
    /// Sub-millisecond base set through [`RetryOptions::with_retry_backoff`].
    /// Takes precedence over `retry_backoff_ms`.
    #[serde(skip)]
    retry_backoff: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            retry_backoff: None,
        }
    }
}

impl RetryOptions {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff_ms(mut self, retry_backoff_ms: u64) -> Self {
        self.retry_backoff_ms = retry_backoff_ms;
        self.retry_backoff = None;
        self
    }

    /// Sets the base backoff with full `Duration` precision.
    ///
    /// `retry_backoff_ms` keeps the whole-millisecond part for display and
    /// serialization; [`retry_backoff`](Self::retry_backoff) returns the exact value.
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.retry_backoff = Some(base);
        self
    }

    /// Total number of attempts this configuration allows.
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Effective per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(effective_timeout_ms(self.timeout_ms))
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
            .unwrap_or_else(|| Duration::from_millis(self.retry_backoff_ms))
    }

    /// Reads options from environment variables.
    ///
    /// Reads:
    /// - `FETCH_RETRY_TIMEOUT_MS`
    /// - `FETCH_RETRY_MAX_RETRIES`
    /// - `FETCH_RETRY_BACKOFF_MS`
    ///
    /// Unset variables keep their defaults; values that do not parse are an error.
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Some(value) = lookup("FETCH_RETRY_TIMEOUT_MS") {
            options.timeout_ms = parse_var("FETCH_RETRY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("FETCH_RETRY_MAX_RETRIES") {
            options.max_retries = parse_var("FETCH_RETRY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("FETCH_RETRY_BACKOFF_MS") {
            options.retry_backoff_ms = parse_var("FETCH_RETRY_BACKOFF_MS", &value)?;
        }
        Ok(options)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> std::result::Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a non-negative integer, got '{value}'"))
}

pub(crate) fn effective_timeout_ms(timeout_ms: u64) -> u64 {
    if timeout_ms == 0 {
        DEFAULT_TIMEOUT_MS
    } else {
        timeout_ms
    }
}

/// Per-request options passed through to the transport.
///
/// `signal` and `timeout` are consumed by the executor; everything else is
/// forwarded verbatim.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Caller-owned cancellation token. Firing it stops the operation without
    /// further retries.
    pub signal: Option<CancellationToken>,
    /// Overrides [`RetryOptions::timeout_ms`] for this request.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::POST).with_body(body)
    }

    pub fn with_header(
        mut self,
        name: reqwest::header::HeaderName,
        value: reqwest::header::HeaderValue,
    ) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolves the timeout for one attempt: request override first, then the
    /// executor's option. A zero duration counts as unset.
    pub(crate) fn attempt_timeout(&self, defaults: &RetryOptions) -> Duration {
        match self.timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => defaults.timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::{RequestOptions, RetryOptions};

    #[test]
    fn defaults_match_documented_values() {
        let options = RetryOptions::default();
        assert_eq!(options.timeout(), Duration::from_millis(8_000));
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.max_attempts(), 3);
        assert_eq!(options.retry_backoff(), Duration::from_millis(500));
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let options = RetryOptions::default().with_timeout_ms(0);
        assert_eq!(options.timeout(), Duration::from_millis(8_000));

        let request = RequestOptions::get().with_timeout(Duration::ZERO);
        assert_eq!(
            request.attempt_timeout(&options),
            Duration::from_millis(8_000)
        );
    }

    #[test]
    fn request_timeout_overrides_executor_timeout() {
        let options = RetryOptions::default().with_timeout_ms(1_000);
        let request = RequestOptions::get().with_timeout(Duration::from_millis(250));
        assert_eq!(
            request.attempt_timeout(&options),
            Duration::from_millis(250)
        );
        assert_eq!(
            RequestOptions::get().attempt_timeout(&options),
            Duration::from_millis(1_000)
        );
    }

    #[test]
    fn exact_backoff_keeps_sub_millisecond_precision() {
        let options = RetryOptions::default().with_retry_backoff(Duration::from_micros(1_900));
        assert_eq!(options.retry_backoff(), Duration::from_micros(1_900));
        assert_eq!(options.retry_backoff_ms, 1);

        let reset = options.with_retry_backoff_ms(3);
        assert_eq!(reset.retry_backoff(), Duration::from_millis(3));
    }

    #[test]
    fn deserializes_partial_config() {
        let options: RetryOptions =
            serde_json::from_str(r#"{ "max_retries": 5 }"#).expect("config must parse");
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.timeout_ms, 8_000);
        assert_eq!(options.retry_backoff_ms, 500);
    }

    #[test]
    fn from_lookup_reads_and_validates_values() {
        let vars: HashMap<&str, &str> = [
            ("FETCH_RETRY_TIMEOUT_MS", "1500"),
            ("FETCH_RETRY_BACKOFF_MS", " 100 "),
        ]
        .into_iter()
        .collect();
        let options = RetryOptions::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
            .expect("env must parse");
        assert_eq!(options.timeout_ms, 1_500);
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.retry_backoff_ms, 100);

        let err = RetryOptions::from_lookup(|name| {
            (name == "FETCH_RETRY_MAX_RETRIES").then(|| "-1".to_owned())
        })
        .expect_err("negative retries must be rejected");
        assert!(err.contains("FETCH_RETRY_MAX_RETRIES"));
    }
}
