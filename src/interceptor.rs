//! Request and response transformers applied around each execution.
//!
//! Request interceptors run once, in registration order, before the first
//! attempt. Response interceptors run in registration order on every attempt
//! that produced a response. The first failure stops the chain.

use std::collections::BTreeSet;
use std::sync::Arc;

use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::info;

use crate::request::Request;
use crate::response::Response;
use crate::util::{parse_header_name, parse_header_value, redact_url_for_logs, truncate_body};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterceptorPhase {
    Request,
    Response,
}

impl std::fmt::Display for InterceptorPhase {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Request => "request",
            Self::Response => "response",
        };
        formatter.write_str(text)
    }
}

/// Failure raised by an interceptor.
///
/// Fatal unless built with [`InterceptorError::transient`], in which case the
/// retry policy may schedule another attempt.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InterceptorError {
    message: String,
    transient: bool,
    #[source]
    source: Option<BoxError>,
}

impl InterceptorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: Request) -> Result<Request, InterceptorError>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(Request) -> Result<Request, InterceptorError> + Send + Sync,
{
    fn intercept(&self, request: Request) -> Result<Request, InterceptorError> {
        self(request)
    }
}

pub trait ResponseInterceptor: Send + Sync {
    fn intercept(&self, response: Response) -> Result<Response, InterceptorError>;
}

impl<F> ResponseInterceptor for F
where
    F: Fn(Response) -> Result<Response, InterceptorError> + Send + Sync,
{
    fn intercept(&self, response: Response) -> Result<Response, InterceptorError> {
        self(response)
    }
}

pub(crate) fn apply_request_interceptors(
    interceptors: &[Arc<dyn RequestInterceptor>],
    request: Request,
) -> Result<Request, InterceptorError> {
    interceptors
        .iter()
        .try_fold(request, |request, interceptor| interceptor.intercept(request))
}

pub(crate) fn apply_response_interceptors(
    interceptors: &[Arc<dyn ResponseInterceptor>],
    response: Response,
) -> Result<Response, InterceptorError> {
    interceptors
        .iter()
        .try_fold(response, |response, interceptor| {
            interceptor.intercept(response)
        })
}

/// Sets a header on every request that does not already carry it.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    pub fn try_new(name: &str, value: &str) -> crate::Result<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(Self::new(name, value))
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn intercept(&self, request: Request) -> Result<Request, InterceptorError> {
        if request.headers().contains_key(&self.name) {
            return Ok(request);
        }
        Ok(request.with_header(self.name.clone(), self.value.clone()))
    }
}

/// Injects `Authorization: Bearer <token>`, replacing any existing value.
#[derive(Clone)]
pub struct BearerAuth {
    value: HeaderValue,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("BearerAuth(<redacted>)")
    }
}

impl BearerAuth {
    pub fn new(token: &str) -> crate::Result<Self> {
        let mut value = parse_header_value(AUTHORIZATION.as_str(), &format!("Bearer {token}"))?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl RequestInterceptor for BearerAuth {
    fn intercept(&self, request: Request) -> Result<Request, InterceptorError> {
        Ok(request.with_header(AUTHORIZATION, self.value.clone()))
    }
}

/// Fails the execution when the response status is 4xx or 5xx.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorStatus;

impl ResponseInterceptor for ErrorStatus {
    fn intercept(&self, response: Response) -> Result<Response, InterceptorError> {
        if !response.is_error() {
            return Ok(response);
        }
        Err(InterceptorError::new(format!(
            "http status {}: {}",
            response.status(),
            truncate_body(response.body())
        )))
    }
}

/// Signals a transient failure for selected statuses so the retry policy
/// treats them like a transport error.
#[derive(Clone, Debug)]
pub struct RetryOnStatus {
    statuses: BTreeSet<u16>,
}

impl RetryOnStatus {
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }
}

impl Default for RetryOnStatus {
    fn default() -> Self {
        Self::new([429, 502, 503, 504])
    }
}

impl ResponseInterceptor for RetryOnStatus {
    fn intercept(&self, response: Response) -> Result<Response, InterceptorError> {
        if self.statuses.contains(&response.status().as_u16()) {
            return Err(InterceptorError::transient(format!(
                "retryable http status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

/// Emits an `info` event per outgoing request and per received response.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

impl RequestInterceptor for LoggingInterceptor {
    fn intercept(&self, request: Request) -> Result<Request, InterceptorError> {
        info!(
            method = %request.method(),
            url = %redact_url_for_logs(request.url()),
            headers = request.headers().len(),
            "outgoing request"
        );
        Ok(request)
    }
}

impl ResponseInterceptor for LoggingInterceptor {
    fn intercept(&self, response: Response) -> Result<Response, InterceptorError> {
        info!(
            status = response.status().as_u16(),
            body_bytes = response.body().len(),
            "received response"
        );
        Ok(response)
    }
}
