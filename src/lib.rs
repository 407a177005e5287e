//! `resilient-fetch` runs HTTP requests with per-attempt timeouts, bounded
//! retries, exponential backoff and cooperative cancellation.
//!
//! Entry points:
//! - [`FetchClient`] for `reqwest`-backed requests
//! - [`fetch_with_retry`] for one-off calls
//! - [`RetryExecutor`] to drive any [`Transport`]

pub mod backoff;
mod client;
mod error;
mod executor;
mod options;
pub mod signal;
mod transport;

pub use client::{fetch_with_retry, FetchClient};
pub use error::{BoxError, FetchError};
pub use executor::RetryExecutor;
pub use options::{
    RequestOptions, RetryOptions, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_TIMEOUT_MS,
};
pub use signal::CompositeSignal;
pub use transport::{ReqwestTransport, Transport, TransportResponse};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, FetchError>;
