use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;

use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::request::TimeoutOverrides;
use crate::retry::RetryPolicy;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-attempt transport timeouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Timeouts {
    pub(crate) fn with_overrides(self, overrides: TimeoutOverrides) -> Self {
        Self {
            connect: overrides.connect.unwrap_or(self.connect),
            read: overrides.read.unwrap_or(self.read),
            write: overrides.write.unwrap_or(self.write),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            write: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Read-only settings of one client, fixed when the client is built.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) timeouts: Timeouts,
    pub(crate) retry_enabled: bool,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) allow_localhost: bool,
    pub(crate) logging_enabled: bool,
    pub(crate) default_headers: HeaderMap,
    pub(crate) request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub(crate) response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl ClientConfig {
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn allow_localhost(&self) -> bool {
        self.allow_localhost
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn request_interceptor_count(&self) -> usize {
        self.request_interceptors.len()
    }

    pub fn response_interceptor_count(&self) -> usize {
        self.response_interceptors.len()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("timeouts", &self.timeouts)
            .field("retry_enabled", &self.retry_enabled)
            .field("retry_policy", &self.retry_policy)
            .field("allow_localhost", &self.allow_localhost)
            .field("logging_enabled", &self.logging_enabled)
            .field("default_headers", &self.default_headers)
            .field("request_interceptors", &self.request_interceptors.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .finish()
    }
}
