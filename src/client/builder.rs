use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::config::{ClientConfig, Timeouts};
use crate::dispatch::{Worker, default_worker};
use crate::extensions::{Resolver, Sleeper, SystemResolver, ThreadSleeper};
use crate::interceptor::{LoggingInterceptor, RequestInterceptor, ResponseInterceptor};
use crate::json::{JsonCodec, SerdeJsonCodec};
use crate::retry::RetryPolicy;
use crate::transport::{
    DEFAULT_MAX_REQUEST_BODY_BYTES, DEFAULT_MAX_RESPONSE_BODY_BYTES, Transport, UreqTransport,
};
use crate::util::{parse_header_name, parse_header_value};

use super::{Client, ClientBuilder, ClientInner, DEFAULT_CLIENT_NAME};

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            timeouts: Timeouts::default(),
            retry_enabled: false,
            retry_policy: RetryPolicy::standard(),
            allow_localhost: false,
            logging_enabled: false,
            default_headers: HeaderMap::new(),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
            worker: None,
            transport: None,
            json_codec: Arc::new(SerdeJsonCodec),
            sleeper: Arc::new(ThreadSleeper),
            resolver: Arc::new(SystemResolver),
        }
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.timeouts.connect = connect_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.timeouts.read = read_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.timeouts.write = write_timeout.max(Duration::from_millis(1));
        self
    }

    /// Off by default: the first outcome of an execution is final.
    pub fn retry_enabled(mut self, retry_enabled: bool) -> Self {
        self.retry_enabled = retry_enabled;
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Permits loopback and private-network hosts. Intended for tests and local tooling.
    pub fn allow_localhost(mut self, allow_localhost: bool) -> Self {
        self.allow_localhost = allow_localhost;
        self
    }

    /// Installs [`LoggingInterceptor`] on both chains when the client is built.
    pub fn logging(mut self, logging_enabled: bool) -> Self {
        self.logging_enabled = logging_enabled;
        self
    }

    pub fn request_interceptor<I>(self, interceptor: I) -> Self
    where
        I: RequestInterceptor + 'static,
    {
        self.request_interceptor_arc(Arc::new(interceptor))
    }

    pub fn request_interceptor_arc(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn response_interceptor<I>(self, interceptor: I) -> Self
    where
        I: ResponseInterceptor + 'static,
    {
        self.response_interceptor_arc(Arc::new(interceptor))
    }

    pub fn response_interceptor_arc(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn try_default_header(self, name: &str, value: &str) -> crate::Result<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.default_header(name, value))
    }

    /// User agent of the default transport.
    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Response size limit of the default transport.
    pub fn max_response_body_bytes(mut self, max_response_body_bytes: usize) -> Self {
        self.max_response_body_bytes = max_response_body_bytes.max(1);
        self
    }

    /// Upper bound for bodies drained from a reader before the first attempt.
    pub fn max_request_body_bytes(mut self, max_request_body_bytes: usize) -> Self {
        self.max_request_body_bytes = max_request_body_bytes.max(1);
        self
    }

    /// Overrides the worker that runs async executions.
    ///
    /// Without one, `build` picks a [`crate::RuntimeWorker`] when called inside a
    /// Tokio runtime and a [`crate::ThreadWorker`] otherwise.
    pub fn worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn json_codec(mut self, json_codec: Arc<dyn JsonCodec>) -> Self {
        self.json_codec = json_codec;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the resolver used to check named hosts for private addresses.
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> Client {
        let mut request_interceptors = self.request_interceptors;
        let mut response_interceptors = self.response_interceptors;
        if self.logging_enabled {
            request_interceptors.push(Arc::new(LoggingInterceptor));
            response_interceptors.insert(0, Arc::new(LoggingInterceptor));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                UreqTransport::new(&self.client_name)
                    .max_response_body_bytes(self.max_response_body_bytes),
            ),
        };
        let worker = self.worker.unwrap_or_else(default_worker);

        Client {
            inner: Arc::new(ClientInner {
                config: ClientConfig {
                    timeouts: self.timeouts,
                    retry_enabled: self.retry_enabled,
                    retry_policy: self.retry_policy,
                    allow_localhost: self.allow_localhost,
                    logging_enabled: self.logging_enabled,
                    default_headers: self.default_headers,
                    request_interceptors,
                    response_interceptors,
                },
                client_name: self.client_name,
                transport,
                codec: self.json_codec,
                worker,
                sleeper: self.sleeper,
                resolver: self.resolver,
                max_request_body_bytes: self.max_request_body_bytes,
            }),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
