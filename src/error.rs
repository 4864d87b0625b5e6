use thiserror::Error;

use crate::interceptor::{InterceptorError, InterceptorPhase};
use crate::json::JsonError;
use crate::request::Method;
use crate::security::SecurityReason;
use crate::transport::TransportError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidUrl,
    InvalidMethod,
    InvalidHeaderName,
    InvalidHeaderValue,
    SerializeJson,
    SerializeForm,
    ReadRequestBody,
    SecurityViolation,
    Transport,
    RetriesExhausted,
    Interceptor,
    Decode,
    WorkerUnavailable,
    WaitInsideRuntime,
    CallbackPanicked,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::InvalidMethod => "invalid_method",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::SerializeJson => "serialize_json",
            Self::SerializeForm => "serialize_form",
            Self::ReadRequestBody => "read_request_body",
            Self::SecurityViolation => "security_violation",
            Self::Transport => "transport",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Interceptor => "interceptor",
            Self::Decode => "decode",
            Self::WorkerUnavailable => "worker_unavailable",
            Self::WaitInsideRuntime => "wait_inside_runtime",
            Self::CallbackPanicked => "callback_panicked",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid request url: {url:?}")]
    InvalidUrl { url: String },
    #[error("unsupported request method: {method}")]
    InvalidMethod { method: String },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("failed to serialize request json: {source}")]
    SerializeJson {
        #[source]
        source: JsonError,
    },
    #[error("failed to serialize request form: {source}")]
    SerializeForm {
        #[source]
        source: serde_urlencoded::ser::Error,
    },
    #[error("failed to read request body: {source}")]
    ReadRequestBody {
        #[source]
        source: std::io::Error,
    },
    #[error("security violation for {url}: {reason}")]
    SecurityViolation { url: String, reason: SecurityReason },
    #[error("http transport error for {method} {url}: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("retries exhausted after {attempts} attempts for {method} {url}: {source}")]
    RetriesExhausted {
        attempts: usize,
        method: Method,
        url: String,
        #[source]
        source: Box<Error>,
    },
    #[error("{phase} interceptor aborted {method} {url}: {source}")]
    Interceptor {
        phase: InterceptorPhase,
        method: Method,
        url: String,
        #[source]
        source: InterceptorError,
    },
    #[error("failed to decode response json: {source}; body={body}")]
    Decode {
        #[source]
        source: JsonError,
        body: String,
    },
    #[error("async worker dropped the request before completion")]
    WorkerUnavailable,
    #[error("blocking wait called inside an async runtime; await the future instead")]
    WaitInsideRuntime,
    #[error("response callback panicked: {message}")]
    CallbackPanicked { message: String },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUrl { .. } => ErrorCode::InvalidUrl,
            Self::InvalidMethod { .. } => ErrorCode::InvalidMethod,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::SerializeJson { .. } => ErrorCode::SerializeJson,
            Self::SerializeForm { .. } => ErrorCode::SerializeForm,
            Self::ReadRequestBody { .. } => ErrorCode::ReadRequestBody,
            Self::SecurityViolation { .. } => ErrorCode::SecurityViolation,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            Self::Interceptor { .. } => ErrorCode::Interceptor,
            Self::Decode { .. } => ErrorCode::Decode,
            Self::WorkerUnavailable => ErrorCode::WorkerUnavailable,
            Self::WaitInsideRuntime => ErrorCode::WaitInsideRuntime,
            Self::CallbackPanicked { .. } => ErrorCode::CallbackPanicked,
        }
    }

    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation { .. })
    }

    /// Whether a single attempt that failed with this error may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.kind().is_transient(),
            Self::Interceptor { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// The error of the final attempt when retries were exhausted, otherwise `self`.
    pub fn last_cause(&self) -> &Error {
        match self {
            Self::RetriesExhausted { source, .. } => source,
            other => other,
        }
    }
}
