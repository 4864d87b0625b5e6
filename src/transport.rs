use std::io::Read;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::config::Timeouts;
use crate::request::Method;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) const DEFAULT_MAX_RESPONSE_BODY_BYTES: usize = 8 * 1024 * 1024;
pub(crate) const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    ConnectTimeout,
    ReadTimeout,
    WriteTimeout,
    ConnectionRefused,
    ConnectionClosed,
    Dns,
    Other,
}

impl TransportErrorKind {
    pub const fn is_transient(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::ReadTimeout => "read_timeout",
            Self::WriteTimeout => "write_timeout",
            Self::ConnectionRefused => "connection_refused",
            Self::ConnectionClosed => "connection_closed",
            Self::Dns => "dns",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A fully prepared attempt: URL already carries the query string and the body
/// is buffered, so the same value can be sent on every retry.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeouts: Timeouts,
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Sends one request over the network.
///
/// Connection pooling and TLS live behind this seam. Implementations must be
/// safe to call from many threads at once.
pub trait Transport: Send + Sync {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
    max_response_body_bytes: usize,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UreqTransport")
            .field("max_response_body_bytes", &self.max_response_body_bytes)
            .finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(client_name: &str) -> Self {
        Self {
            agent: make_agent(client_name),
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
        }
    }

    pub fn max_response_body_bytes(mut self, max_response_body_bytes: usize) -> Self {
        self.max_response_body_bytes = max_response_body_bytes.max(1);
        self
    }
}

// Redirects come back as responses. Only the validated URL is ever dialed.
fn make_agent(client_name: &str) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .max_redirects_will_error(false)
        .user_agent(client_name)
        .build();
    config.new_agent()
}

impl Transport for UreqTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_http())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let http_request = builder.body(request.body.to_vec()).map_err(|source| {
            TransportError::new(TransportErrorKind::Other, "failed to build http request")
                .with_source(source)
        })?;

        let timeouts = request.timeouts;
        let configured_request = self
            .agent
            .configure_request(http_request)
            .timeout_connect(Some(timeouts.connect))
            .timeout_send_request(Some(timeouts.write))
            .timeout_send_body(Some(timeouts.write))
            .timeout_recv_response(Some(timeouts.read))
            .timeout_recv_body(Some(timeouts.read))
            .build();

        let mut response = self
            .agent
            .run(configured_request)
            .map_err(map_ureq_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_all_body_limited(&mut response, self.max_response_body_bytes)?;
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_ureq_error(error: ureq::Error) -> TransportError {
    let kind = classify_ureq_error(&error);
    TransportError::new(kind, error.to_string()).with_source(error)
}

pub(crate) fn classify_ureq_error(error: &ureq::Error) -> TransportErrorKind {
    match error {
        ureq::Error::Timeout(timeout) => classify_ureq_timeout(timeout),
        ureq::Error::HostNotFound => TransportErrorKind::Dns,
        ureq::Error::ConnectionFailed => TransportErrorKind::ConnectionRefused,
        ureq::Error::Io(source) => classify_io_error(source),
        _ => TransportErrorKind::Other,
    }
}

fn classify_ureq_timeout(timeout: &ureq::Timeout) -> TransportErrorKind {
    match timeout {
        ureq::Timeout::Resolve | ureq::Timeout::Connect => TransportErrorKind::ConnectTimeout,
        ureq::Timeout::SendRequest | ureq::Timeout::SendBody | ureq::Timeout::Await100 => {
            TransportErrorKind::WriteTimeout
        }
        _ => TransportErrorKind::ReadTimeout,
    }
}

pub(crate) fn classify_io_error(source: &std::io::Error) -> TransportErrorKind {
    match source.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            TransportErrorKind::ReadTimeout
        }
        std::io::ErrorKind::NotFound => TransportErrorKind::Dns,
        std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::AddrNotAvailable => TransportErrorKind::ConnectionRefused,
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::UnexpectedEof => TransportErrorKind::ConnectionClosed,
        _ => TransportErrorKind::Other,
    }
}

fn read_all_body_limited(
    response: &mut ureq::http::Response<ureq::Body>,
    max_bytes: usize,
) -> Result<Bytes, TransportError> {
    let mut reader = response.body_mut().as_reader();
    let mut collected = Vec::new();
    let mut chunk = [0_u8; 8192];
    let mut total_len = 0_usize;

    loop {
        let read = reader.read(&mut chunk).map_err(map_body_read_error)?;
        if read == 0 {
            break;
        }
        total_len = total_len.saturating_add(read);
        if total_len > max_bytes {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!("response body too large ({total_len} bytes > {max_bytes} bytes)"),
            ));
        }
        collected.extend_from_slice(&chunk[..read]);
    }

    Ok(Bytes::from(collected))
}

fn map_body_read_error(source: std::io::Error) -> TransportError {
    let kind = match source
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ureq::Error>())
    {
        Some(ureq_error) => classify_ureq_error(ureq_error),
        None => classify_io_error(&source),
    };
    TransportError::new(kind, format!("failed to read response body: {source}"))
        .with_source(source)
}
