use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;

use crate::dispatch::ResponseFuture;
use crate::error::Error;
use crate::json::JsonError;
use crate::request::{Method, Request, RequestBody, TimeoutOverrides};
use crate::response::Response;
use crate::util::{parse_header_name, parse_header_value};

use super::Client;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Staging object for one request.
///
/// Every method consumes the builder. Invalid input is remembered and
/// reported by [`RequestBuilder::build`] (and so by every `execute*` call)
/// before any network activity.
pub struct RequestBuilder<'a> {
    client: &'a Client,
    method: Method,
    url: String,
    query_pairs: Vec<(String, String)>,
    headers: HeaderMap,
    body: RequestBody,
    timeouts: TimeoutOverrides,
    error: Option<Error>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a Client, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            query_pairs: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            timeouts: TimeoutOverrides::default(),
            error: None,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_pairs.push((name.into(), value.into()));
        self
    }

    pub fn query_pairs<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.query_pairs.extend(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    /// Sets a header, replacing earlier values. Invalid input fails the build.
    pub fn header(self, name: &str, value: &str) -> Self {
        let parsed = parse_header_name(name).and_then(|name| {
            let value = parse_header_value(name.as_str(), value)?;
            Ok((name, value))
        });
        match parsed {
            Ok((name, value)) => self.header_value(name, value),
            Err(error) => self.fail(error),
        }
    }

    pub fn try_header(self, name: &str, value: &str) -> crate::Result<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.header_value(name, value))
    }

    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        match parse_header_value(AUTHORIZATION.as_str(), &format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.header_value(AUTHORIZATION, value)
            }
            Err(error) => self.fail(error),
        }
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    /// Serializes `payload` now; the client's codec encodes it at execution.
    pub fn json<T>(mut self, payload: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(payload) {
            Ok(value) => {
                self.body = RequestBody::Json(value);
                self
            }
            Err(source) => self.fail(Error::SerializeJson {
                source: JsonError::from(source),
            }),
        }
    }

    pub fn form<T>(mut self, payload: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match serde_urlencoded::to_string(payload) {
            Ok(encoded) => {
                self.body = RequestBody::Bytes(Bytes::from(encoded));
                if !self.headers.contains_key(CONTENT_TYPE) {
                    self.headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
                }
                self
            }
            Err(source) => self.fail(Error::SerializeForm { source }),
        }
    }

    /// The reader is drained once before the first attempt.
    pub fn body_reader<R>(mut self, reader: R) -> Self
    where
        R: Read + Send + Sync + 'static,
    {
        self.body = RequestBody::Reader(Box::new(reader));
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.timeouts.connect = Some(connect_timeout.max(Duration::from_millis(1)));
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.timeouts.read = Some(read_timeout.max(Duration::from_millis(1)));
        self
    }

    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.timeouts.write = Some(write_timeout.max(Duration::from_millis(1)));
        self
    }

    pub fn build(self) -> crate::Result<Request> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Request::from_parts(
            self.method,
            self.url,
            self.query_pairs,
            self.headers,
            self.body,
            self.timeouts,
        ))
    }

    pub fn execute(self) -> crate::Result<Response> {
        let client = self.client;
        client.execute(self.build()?)
    }

    pub fn execute_async(self) -> ResponseFuture {
        let client = self.client;
        match self.build() {
            Ok(request) => client.execute_async(request),
            Err(error) => ResponseFuture::ready(Err(error)),
        }
    }

    /// Runs on the client's worker; failures are logged and dropped.
    pub fn execute_with<S>(self, on_success: S)
    where
        S: FnOnce(Response) + Send + 'static,
    {
        let client = self.client;
        client.spawn_with_success(self.build(), on_success);
    }

    pub fn execute_with_handlers<S, E>(self, on_success: S, on_error: E)
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        let client = self.client;
        client.spawn_with_handlers(self.build(), on_success, on_error);
    }

    fn fail(mut self, error: Error) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }
}
