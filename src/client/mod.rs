use std::sync::Arc;

use http::HeaderMap;

use crate::config::{ClientConfig, Timeouts};
use crate::dispatch::Worker;
use crate::extensions::{Resolver, Sleeper};
use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::json::JsonCodec;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

mod builder;
mod execute;
mod request;

pub use request::RequestBuilder;

const DEFAULT_CLIENT_NAME: &str = concat!("mocha/", env!("CARGO_PKG_VERSION"));

pub struct ClientBuilder {
    timeouts: Timeouts,
    retry_enabled: bool,
    retry_policy: RetryPolicy,
    allow_localhost: bool,
    logging_enabled: bool,
    default_headers: HeaderMap,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    max_response_body_bytes: usize,
    max_request_body_bytes: usize,
    client_name: String,
    worker: Option<Arc<dyn Worker>>,
    transport: Option<Arc<dyn Transport>>,
    json_codec: Arc<dyn JsonCodec>,
    sleeper: Arc<dyn Sleeper>,
    resolver: Arc<dyn Resolver>,
}

/// An HTTP client with read-only configuration.
///
/// Cloning is cheap and clones share one configuration; separately built
/// clients share nothing.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    client_name: String,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn JsonCodec>,
    worker: Arc<dyn Worker>,
    sleeper: Arc<dyn Sleeper>,
    resolver: Arc<dyn Resolver>,
    max_request_body_bytes: usize,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Client")
            .field("client_name", &self.inner.client_name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
