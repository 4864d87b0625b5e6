use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::json::{JsonCodec, JsonError, JsonErrorCategory};
use crate::util::{lock_unpoisoned, truncate_body};

type TypedView = Result<Arc<dyn Any + Send + Sync>, JsonError>;

/// A completed response.
///
/// The body is parsed by the client's [`JsonCodec`] at most once; typed views
/// built from that tree are cached per target type. Failures are cached too.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    codec: Arc<dyn JsonCodec>,
    tree: OnceLock<Result<Value, JsonError>>,
    typed: Mutex<HashMap<TypeId, TypedView>>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_bytes", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl Response {
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
        codec: Arc<dyn JsonCodec>,
    ) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            codec,
            tree: OnceLock::new(),
            typed: Mutex::new(HashMap::new()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name`, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }

    pub fn with_status(self, status: StatusCode) -> Self {
        Self::new(status, self.headers, self.body, self.codec)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        Self::new(self.status, self.headers, self.body, self.codec)
    }

    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        Self::new(self.status, self.headers, body, self.codec)
    }

    /// The body as a generic JSON tree.
    pub fn decode_generic(&self) -> crate::Result<&Value> {
        self.tree()
            .as_ref()
            .map_err(|source| self.decode_error(source.clone()))
    }

    pub fn to_map(&self) -> crate::Result<&Map<String, Value>> {
        let tree = self.decode_generic()?;
        tree.as_object()
            .ok_or_else(|| self.decode_error(JsonError::shape("object", tree)))
    }

    pub fn to_list(&self) -> crate::Result<&Vec<Value>> {
        let tree = self.decode_generic()?;
        tree.as_array()
            .ok_or_else(|| self.decode_error(JsonError::shape("array", tree)))
    }

    /// Chainable, cast-free access into a JSON object body.
    pub fn json_map(&self) -> crate::Result<JsonMap<'_>> {
        Ok(JsonMap::new(self.to_map_value()?))
    }

    /// The body decoded as `T`. Repeated calls for the same `T` return the cached value.
    pub fn decode_as<T>(&self) -> crate::Result<Arc<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let view = {
            let mut typed = lock_unpoisoned(&self.typed);
            typed
                .entry(TypeId::of::<T>())
                .or_insert_with(|| self.decode_typed::<T>())
                .clone()
        };
        match view {
            Ok(view) => view.downcast::<T>().map_err(|_| {
                self.decode_error(JsonError::new(
                    JsonErrorCategory::Shape,
                    "cached view has an unexpected type",
                ))
            }),
            Err(source) => Err(self.decode_error(source)),
        }
    }

    fn tree(&self) -> &Result<Value, JsonError> {
        self.tree.get_or_init(|| self.codec.decode(&self.body))
    }

    fn to_map_value(&self) -> crate::Result<&Value> {
        let tree = self.decode_generic()?;
        if tree.is_object() {
            Ok(tree)
        } else {
            Err(self.decode_error(JsonError::shape("object", tree)))
        }
    }

    fn decode_typed<T>(&self) -> TypedView
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let tree = self.tree().as_ref().map_err(Clone::clone)?;
        let value = T::deserialize(tree).map_err(JsonError::from)?;
        Ok(Arc::new(value))
    }

    fn decode_error(&self, source: JsonError) -> Error {
        Error::Decode {
            source,
            body: truncate_body(&self.body),
        }
    }
}

/// A view into a JSON tree that never fails while navigating.
///
/// Missing keys and non-object parents yield an empty view; the value is
/// inspected only at the end of the chain.
#[derive(Clone, Copy, Debug)]
pub struct JsonMap<'a> {
    value: Option<&'a Value>,
}

impl<'a> JsonMap<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value: Some(value) }
    }

    pub fn get(&self, key: &str) -> JsonMap<'a> {
        JsonMap {
            value: self.value.and_then(|value| value.get(key)),
        }
    }

    pub fn at(&self, index: usize) -> JsonMap<'a> {
        JsonMap {
            value: self.value.and_then(|value| value.get(index)),
        }
    }

    pub fn value(&self) -> Option<&'a Value> {
        self.value
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_map(&self) -> bool {
        self.value.is_some_and(Value::is_object)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.value.and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value.and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value.and_then(Value::as_bool)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.value
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }
}

impl std::fmt::Display for JsonMap<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            None | Some(Value::Null) => formatter.write_str("null"),
            Some(Value::String(text)) => formatter.write_str(text),
            Some(other) => write!(formatter, "{other}"),
        }
    }
}
