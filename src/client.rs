use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{
    executor::RetryExecutor, transport::ReqwestTransport, FetchError, RequestOptions, Result,
    RetryOptions,
};

#[derive(Clone)]
/// HTTP client that runs every request through a [`RetryExecutor`].
pub struct FetchClient {
    executor: RetryExecutor<ReqwestTransport>,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("options", self.executor.options())
            .finish()
    }
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClient {
    /// Creates a client with a fresh `reqwest::Client` and default options.
    pub fn new() -> Self {
        Self::with_http(reqwest::Client::new())
    }

    /// Creates a client around an existing `reqwest::Client`, sharing its
    /// connection pool.
    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            executor: RetryExecutor::new(ReqwestTransport::new(http)),
        }
    }

    /// Creates a client whose options come from `FETCH_RETRY_*` environment
    /// variables.
    ///
    /// See [`RetryOptions::from_env`] for the variables read.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use resilient_fetch::FetchClient;
    ///
    /// let client = FetchClient::from_env().expect("invalid FETCH_RETRY_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self::new().with_options(RetryOptions::from_env()?))
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: RetryOptions) -> Self {
        self.executor = self.executor.with_options(opts);
        self
    }

    pub fn options(&self) -> &RetryOptions {
        self.executor.options()
    }

    /// Sends a request, retrying on transport errors, timeouts and
    /// non-success statuses.
    pub async fn fetch(&self, url: &str, request: &RequestOptions) -> Result<reqwest::Response> {
        self.executor.execute(url, request).await
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.fetch(url, &RequestOptions::get()).await
    }

    /// Sends a request and decodes a successful response body as JSON.
    ///
    /// Decoding happens once, after the retry loop has produced a response;
    /// a malformed body is not retried.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        request: &RequestOptions,
    ) -> Result<T> {
        let response = self.fetch(url, request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|err| FetchError::Decode(format!("invalid JSON response: {err}; body: {body}")))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.fetch_json(url, &RequestOptions::get()).await
    }
}

/// `reqwest::Client` shared by every [`fetch_with_retry`] call, so one-shot
/// requests reuse a single connection pool.
fn shared_http() -> &'static reqwest::Client {
    static HTTP: OnceLock<reqwest::Client> = OnceLock::new();
    HTTP.get_or_init(reqwest::Client::new)
}

/// One-shot form of [`FetchClient::fetch`] with an explicit retry budget and
/// base backoff.
///
/// The per-attempt timeout comes from `request.timeout`, or 8 seconds. Calls
/// share one process-wide `reqwest::Client`; applications running several
/// tokio runtimes should keep a [`FetchClient`] per runtime instead.
pub async fn fetch_with_retry(
    url: &str,
    request: &RequestOptions,
    max_retries: usize,
    backoff: Duration,
) -> Result<reqwest::Response> {
    let options = RetryOptions::default()
        .with_max_retries(max_retries)
        .with_retry_backoff(backoff);
    FetchClient::with_http(shared_http().clone())
        .with_options(options)
        .fetch(url, request)
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{fetch_with_retry, shared_http, FetchClient};
    use crate::{FetchError, RequestOptions, RetryOptions};

    #[test]
    fn debug_shows_options() {
        let client = FetchClient::new().with_options(RetryOptions::default().with_max_retries(4));
        let debug = format!("{client:?}");
        assert!(debug.contains("FetchClient"));
        assert!(debug.contains("max_retries: 4"));
    }

    #[test]
    fn one_shot_calls_share_one_http_client() {
        assert!(std::ptr::eq(shared_http(), shared_http()));
    }

    #[tokio::test]
    async fn fetch_with_retry_keeps_sub_millisecond_backoff() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
        let address = listener.local_addr().expect("must have local addr");
        drop(listener);

        let start = std::time::Instant::now();
        let err = fetch_with_retry(
            &format!("http://{address}/"),
            &RequestOptions::get(),
            3,
            Duration::from_micros(1_900),
        )
        .await
        .expect_err("nothing is listening");

        assert!(matches!(err, FetchError::Transport(_)));
        // 1.9 + 3.8 + 7.6 ms; a millisecond-truncated base would total 7 ms.
        assert!(start.elapsed() >= Duration::from_micros(13_300));
    }
}
