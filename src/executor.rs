use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::backoff_delay,
    signal::AttemptController,
    transport::{Transport, TransportResponse},
    FetchError, RequestOptions, Result, RetryOptions,
};

/// Runs one logical request as a bounded series of attempts.
///
/// Every attempt gets its own timeout and cancellation controller. Failures
/// (transport errors, timeouts, non-success statuses, missing responses) are
/// retried with exponential backoff until the retry budget is spent. Caller
/// cancellation short-circuits the whole operation.
#[derive(Clone, Debug)]
pub struct RetryExecutor<T> {
    transport: T,
    options: RetryOptions,
}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
struct Attempt {
    index: usize,
    started: Instant,
}

impl Attempt {
    fn start(index: usize) -> Self {
        Self {
            index,
            started: Instant::now(),
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

impl<T: Transport> RetryExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            options: RetryOptions::default(),
        }
    }

    /// Applies timeout and retry options.
    pub fn with_options(mut self, options: RetryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` to `target`, retrying until success, cancellation or
    /// exhaustion.
    ///
    /// On exhaustion the error of the final attempt is returned. If the
    /// caller's signal fires at any point the result is
    /// [`FetchError::Cancelled`].
    pub async fn execute(&self, target: &str, request: &RequestOptions) -> Result<T::Response> {
        let max_attempts = self.options.max_attempts();
        let timeout = request.attempt_timeout(&self.options);
        let base = self.options.retry_backoff();
        let caller = request.signal.as_ref();
        let mut last_error = None;

        for index in 1..=max_attempts {
            let attempt = Attempt::start(index);
            let error = match self.run_attempt(target, request, timeout).await {
                Ok(response) => {
                    if attempt.index > 1 {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            url = target,
                            attempt = attempt.index,
                            "request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            if caller.is_some_and(CancellationToken::is_cancelled) {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    url = target,
                    attempt = attempt.index,
                    "request cancelled by caller"
                );
                return Err(FetchError::Cancelled {
                    attempts: attempt.index,
                });
            }

            if attempt.index == max_attempts {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    url = target,
                    attempts = attempt.index,
                    error = %error,
                    "request failed, retries exhausted"
                );
                last_error = Some(error);
                break;
            }

            let delay = backoff_delay(base, attempt.index);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                url = target,
                attempt = attempt.index,
                elapsed_ms = attempt.elapsed_ms(),
                delay_ms = delay.as_millis(),
                error = %error,
                "attempt failed, retrying"
            );
            last_error = Some(error);

            if !wait_before_retry(delay, caller).await {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    url = target,
                    attempt = attempt.index,
                    "request cancelled during backoff"
                );
                return Err(FetchError::Cancelled {
                    attempts: attempt.index,
                });
            }
        }

        Err(last_error.unwrap_or(FetchError::Exhausted {
            attempts: max_attempts,
        }))
    }

    /// One attempt: transport call raced against the timeout and the caller's
    /// signal. The first branch to settle decides the outcome; the others are
    /// dropped with the controller.
    async fn run_attempt(
        &self,
        target: &str,
        request: &RequestOptions,
        timeout: Duration,
    ) -> Result<T::Response> {
        let controller = AttemptController::new(request.signal.as_ref());
        let caller = request.signal.clone().unwrap_or_default();
        let has_caller = request.signal.is_some();

        let outcome = tokio::select! {
            biased;
            () = caller.cancelled(), if has_caller => Err(FetchError::Aborted),
            () = sleep(timeout) => {
                controller.abort();
                Err(FetchError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            sent = self.transport.send(target, request, controller.signal()) => {
                match sent {
                    Ok(Some(response)) => Ok(response),
                    Ok(None) => Err(FetchError::NoResponse),
                    Err(err) => Err(err.into()),
                }
            }
        };

        let response = outcome?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(FetchError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            })
        }
    }
}

/// Sleeps for `delay`, returning `false` if the caller cancelled first.
async fn wait_before_retry(delay: Duration, caller: Option<&CancellationToken>) -> bool {
    match caller {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => false,
            () = sleep(delay) => true,
        },
        None => {
            sleep(delay).await;
            true
        }
    }
}
