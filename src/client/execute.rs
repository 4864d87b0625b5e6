use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CONTENT_TYPE, HeaderValue};
use tracing::{debug, info_span, warn};

use crate::config::ClientConfig;
use crate::dispatch::{ResponseFuture, deliver_to_handlers, deliver_to_success, spawn_execution};
use crate::error::Error;
use crate::interceptor::{InterceptorPhase, apply_request_interceptors, apply_response_interceptors};
use crate::json::JsonCodec;
use crate::request::{Method, Request, RequestBody};
use crate::response::Response;
use crate::retry::{RetryDecision, RetryState, RetryTracker};
use crate::security::{self, ResolveTarget, SecurityReason};
use crate::transport::{TransportError, TransportErrorKind, TransportRequest};
use crate::util::{append_query_pairs, merge_default_headers, redact_url_for_logs};

use super::{Client, ClientBuilder, RequestBuilder};

const JSON_CONTENT_TYPE: &str = "application/json";

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client with default settings.
    pub fn new() -> Self {
        ClientBuilder::new().build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn client_name(&self) -> &str {
        &self.inner.client_name
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Put, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Delete, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Patch, url)
    }

    /// Runs `request` to completion on the calling thread, including every
    /// retry and backoff wait.
    pub fn execute(&self, mut request: Request) -> crate::Result<Response> {
        let config = &self.inner.config;
        let mut validated = security::validate(request.url(), config.allow_localhost)?;

        merge_default_headers(&config.default_headers, request.headers_mut());
        let submitted_url = request.url().to_owned();
        let method = request.method();
        let request =
            apply_request_interceptors(&config.request_interceptors, request).map_err(|source| {
                Error::Interceptor {
                    phase: InterceptorPhase::Request,
                    method,
                    url: redact_url_for_logs(&submitted_url),
                    source,
                }
            })?;
        if request.url() != submitted_url {
            validated = security::validate(request.url(), config.allow_localhost)?;
        }

        let (method, _, query_pairs, mut headers, body, overrides) = request.into_parts();
        let body = buffer_body(
            body,
            self.inner.codec.as_ref(),
            &mut headers,
            self.inner.max_request_body_bytes,
        )?;
        let url = append_query_pairs(validated.as_str(), &query_pairs);
        let redacted_url = redact_url_for_logs(&url);
        let resolve_target = if config.allow_localhost {
            None
        } else {
            security::resolve_target(&validated)
        };
        let transport_request = TransportRequest {
            method,
            url,
            headers,
            body,
            timeouts: config.timeouts.with_overrides(overrides),
        };
        self.run_attempts(&transport_request, resolve_target.as_ref(), &redacted_url)
    }

    /// Runs `request` on the client's worker.
    pub fn execute_async(&self, request: Request) -> ResponseFuture {
        let client = self.clone();
        spawn_execution(self.inner.worker.as_ref(), move || client.execute(request))
    }

    /// Runs `request` on the client's worker and hands a successful response
    /// to `on_success`. Failures are logged and dropped.
    pub fn execute_with<S>(&self, request: Request, on_success: S)
    where
        S: FnOnce(Response) + Send + 'static,
    {
        self.spawn_with_success(Ok(request), on_success);
    }

    pub fn execute_with_handlers<S, E>(&self, request: Request, on_success: S, on_error: E)
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.spawn_with_handlers(Ok(request), on_success, on_error);
    }

    pub(super) fn spawn_with_success<S>(&self, request: crate::Result<Request>, on_success: S)
    where
        S: FnOnce(Response) + Send + 'static,
    {
        let client = self.clone();
        self.inner.worker.spawn(Box::new(move || {
            let result = request.and_then(|request| client.execute(request));
            deliver_to_success(result, on_success);
        }));
    }

    pub(super) fn spawn_with_handlers<S, E>(
        &self,
        request: crate::Result<Request>,
        on_success: S,
        on_error: E,
    ) where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        let client = self.clone();
        self.inner.worker.spawn(Box::new(move || {
            let result = request.and_then(|request| client.execute(request));
            deliver_to_handlers(result, on_success, on_error);
        }));
    }

    fn run_attempts(
        &self,
        request: &TransportRequest,
        resolve_target: Option<&ResolveTarget>,
        redacted_url: &str,
    ) -> crate::Result<Response> {
        let config = &self.inner.config;
        let mut tracker = RetryTracker::new(&config.retry_policy, config.retry_enabled);

        loop {
            let attempt = tracker.attempt();
            let span = info_span!(
                "mocha.request",
                client = %self.inner.client_name,
                method = %request.method,
                url = %redacted_url,
                attempt = attempt,
                max_attempts = tracker.max_attempts()
            );
            let _enter = span.enter();
            let started = Instant::now();

            debug!("sending request");
            let error = match self.attempt_once(config, request, resolve_target, redacted_url) {
                Ok(response) => {
                    tracker.record_success();
                    debug!(
                        status = response.status().as_u16(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        retry_wait_ms = tracker.total_wait().as_millis() as u64,
                        state = ?tracker.state(),
                        "request completed"
                    );
                    return Ok(response);
                }
                Err(error) => error,
            };

            let decision = RetryDecision::for_error(
                attempt,
                tracker.max_attempts(),
                request.method,
                redacted_url,
                &error,
            );
            match tracker.record_failure(&decision) {
                RetryState::Waiting => {
                    let delay = tracker.schedule_next_attempt();
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying request after transient failure"
                    );
                    self.inner.sleeper.sleep(delay);
                }
                RetryState::Exhausted => {
                    debug!(
                        retry_wait_ms = tracker.total_wait().as_millis() as u64,
                        error = %error,
                        "retries exhausted"
                    );
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        method: request.method,
                        url: redacted_url.to_owned(),
                        source: Box::new(error),
                    });
                }
                state => {
                    debug!(state = ?state, error = %error, "request failed");
                    return Err(error);
                }
            }
        }
    }

    fn attempt_once(
        &self,
        config: &ClientConfig,
        request: &TransportRequest,
        resolve_target: Option<&ResolveTarget>,
        redacted_url: &str,
    ) -> crate::Result<Response> {
        if let Some(target) = resolve_target {
            self.ensure_public_addresses(target, request.method, redacted_url)?;
        }
        let raw = self
            .inner
            .transport
            .send(request)
            .map_err(|source| Error::Transport {
                method: request.method,
                url: redacted_url.to_owned(),
                source,
            })?;
        let response = Response::new(
            raw.status,
            raw.headers,
            raw.body,
            Arc::clone(&self.inner.codec),
        );
        apply_response_interceptors(&config.response_interceptors, response).map_err(|source| {
            Error::Interceptor {
                phase: InterceptorPhase::Response,
                method: request.method,
                url: redacted_url.to_owned(),
                source,
            }
        })
    }

    /// Resolves `target` and fails unless every address is public.
    fn ensure_public_addresses(
        &self,
        target: &ResolveTarget,
        method: Method,
        redacted_url: &str,
    ) -> crate::Result<()> {
        let dns_failure = |error: TransportError| Error::Transport {
            method,
            url: redacted_url.to_owned(),
            source: error,
        };
        let addresses = self
            .inner
            .resolver
            .resolve(&target.host, target.port)
            .map_err(|source| {
                dns_failure(
                    TransportError::new(
                        TransportErrorKind::Dns,
                        format!("failed to resolve {}", target.host),
                    )
                    .with_source(source),
                )
            })?;
        if addresses.is_empty() {
            return Err(dns_failure(TransportError::new(
                TransportErrorKind::Dns,
                format!("{} resolved to no addresses", target.host),
            )));
        }
        if let Some(address) = security::first_private_address(&addresses) {
            warn!(
                host = %target.host,
                address = %address,
                "host resolves to a private address"
            );
            return Err(Error::SecurityViolation {
                url: redacted_url.to_owned(),
                reason: SecurityReason::PrivateNetwork,
            });
        }
        Ok(())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns the body into the bytes every attempt will send.
fn buffer_body(
    body: RequestBody,
    codec: &dyn JsonCodec,
    headers: &mut HeaderMap,
    max_reader_bytes: usize,
) -> crate::Result<Bytes> {
    match body {
        RequestBody::Empty => Ok(Bytes::new()),
        RequestBody::Bytes(bytes) => Ok(bytes),
        RequestBody::Json(value) => {
            let encoded = codec
                .encode(&value)
                .map_err(|source| Error::SerializeJson { source })?;
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }
            Ok(Bytes::from(encoded))
        }
        RequestBody::Reader(reader) => {
            let mut buffered = Vec::new();
            reader
                .take((max_reader_bytes as u64).saturating_add(1))
                .read_to_end(&mut buffered)
                .map_err(|source| Error::ReadRequestBody { source })?;
            if buffered.len() > max_reader_bytes {
                return Err(Error::ReadRequestBody {
                    source: io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("request body exceeds {max_reader_bytes} bytes"),
                    ),
                });
            }
            Ok(Bytes::from(buffered))
        }
    }
}
