use std::future::Future;

use reqwest::StatusCode;

use crate::{signal::CompositeSignal, FetchError, RequestOptions};

/// Response whose status can be inspected by the executor.
pub trait TransportResponse {
    fn status(&self) -> StatusCode;
}

impl TransportResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

/// Performs one network call.
///
/// Implementations must stop promptly once `abort` fires. Resolving with
/// `Ok(None)` means the call completed without producing a response.
pub trait Transport {
    type Response: TransportResponse;
    type Error: Into<FetchError>;

    fn send(
        &self,
        target: &str,
        request: &RequestOptions,
        abort: &CompositeSignal,
    ) -> impl Future<Output = Result<Option<Self::Response>, Self::Error>> + Send;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

impl Transport for ReqwestTransport {
    type Response = reqwest::Response;
    type Error = FetchError;

    fn send(
        &self,
        target: &str,
        request: &RequestOptions,
        abort: &CompositeSignal,
    ) -> impl Future<Output = Result<Option<Self::Response>, Self::Error>> + Send {
        let mut builder = self
            .http
            .request(request.method.clone(), target)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let abort = abort.clone();

        async move {
            tokio::select! {
                biased;
                () = abort.cancelled() => Err(FetchError::Aborted),
                response = builder.send() => response.map(Some).map_err(FetchError::from),
            }
        }
    }
}
