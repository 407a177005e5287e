/// Boxed error raised by a [`Transport`](crate::Transport) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A single attempt did not settle within its timeout.
    #[error("timeout after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Network or request execution error from the transport.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// Response arrived with a non-success HTTP status.
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },
    /// The transport resolved without producing a response.
    #[error("no response")]
    NoResponse,
    /// The transport observed its abort token before completing.
    #[error("request aborted")]
    Aborted,
    /// The caller's cancellation token fired. Never retried.
    #[error("request cancelled by caller after {attempts} attempt(s)")]
    Cancelled { attempts: usize },
    /// Every attempt was consumed without an error being recorded.
    #[error("failed to fetch after {attempts} attempt(s)")]
    Exhausted { attempts: usize },
    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Wraps any transport-level error.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Returns `true` for failures that the executor retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transport(_)
                | Self::Http { .. }
                | Self::NoResponse
                | Self::Aborted
        )
    }

    /// Returns `true` if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
