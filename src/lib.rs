//! `mocha` is a small HTTP client for JSON APIs with interceptors, opt-in
//! retries, SSRF-safe URL validation and blocking or async dispatch.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use mocha::prelude::{Client, RetryPolicy};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .client_name("my-sdk")
//!         .read_timeout(Duration::from_secs(5))
//!         .retry_enabled(true)
//!         .retry_policy(
//!             RetryPolicy::standard()
//!                 .base_backoff(Duration::from_millis(200))
//!                 .max_backoff(Duration::from_secs(2)),
//!         )
//!         .build();
//!
//!     let response = client
//!         .get("https://api.example.com/users/7")
//!         .query("expand", "profile")
//!         .execute()?;
//!     let user = response.decode_as::<User>()?;
//!     println!("user {} is {}", user.id, user.name);
//!
//!     let city = response.json_map()?.get("profile").get("city").to_string();
//!     println!("lives in {city}");
//!     Ok(())
//! }
//! ```
//!
//! # Defaults
//!
//! - Retries are off; enable them with `retry_enabled(true)`.
//! - Loopback and private-network hosts are rejected unless `allow_localhost(true)`.
//! - Redirects are returned to the caller, never followed.

use std::sync::{Arc, OnceLock};

mod client;
mod config;
mod dispatch;
mod error;
mod extensions;
mod interceptor;
mod json;
mod request;
mod response;
mod retry;
mod security;
mod transport;
mod util;

pub use crate::client::{Client, ClientBuilder, RequestBuilder};
pub use crate::config::{ClientConfig, Timeouts};
pub use crate::dispatch::{Job, ResponseFuture, RuntimeWorker, ThreadWorker, Worker};
pub use crate::error::{Error, ErrorCode};
pub use crate::extensions::{Resolver, Sleeper, SystemResolver, ThreadSleeper};
pub use crate::interceptor::{
    BearerAuth, ErrorStatus, HeaderInterceptor, InterceptorError, InterceptorPhase,
    LoggingInterceptor, RequestInterceptor, ResponseInterceptor, RetryOnStatus,
};
pub use crate::json::{JsonCodec, JsonError, JsonErrorCategory, SerdeJsonCodec};
pub use crate::request::{Method, Request, RequestBody, TimeoutOverrides};
pub use crate::response::{JsonMap, Response};
pub use crate::retry::{RetryClassifier, RetryDecision, RetryPolicy, RetryState};
pub use crate::security::{SecurityReason, validate as validate_url};
pub use crate::transport::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
    UreqTransport,
};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Client, ClientBuilder, Error, InterceptorError, Method, Request, RequestBuilder,
        Response, Result, RetryPolicy,
    };
}

/// The process-wide client behind the crate-level shortcuts.
///
/// Built on first use with default settings and a thread-per-job worker, so it
/// never outlives a Tokio runtime it was created in.
pub fn default_client() -> &'static Client {
    static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();
    DEFAULT_CLIENT.get_or_init(|| {
        Client::builder()
            .worker(Arc::new(ThreadWorker::default()))
            .build()
    })
}

pub fn get(url: impl Into<String>) -> RequestBuilder<'static> {
    default_client().get(url)
}

pub fn post(url: impl Into<String>) -> RequestBuilder<'static> {
    default_client().post(url)
}

pub fn put(url: impl Into<String>) -> RequestBuilder<'static> {
    default_client().put(url)
}

pub fn delete(url: impl Into<String>) -> RequestBuilder<'static> {
    default_client().delete(url)
}

pub fn patch(url: impl Into<String>) -> RequestBuilder<'static> {
    default_client().patch(url)
}
