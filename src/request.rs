//! Request descriptors.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;

/// Everything needed to perform one logical API call.
///
/// Descriptors are built with consuming builder methods and handed to
/// [`Client::execute`](crate::Client::execute) or
/// [`Client::execute_with_headers`](crate::Client::execute_with_headers).
///
/// # Examples
///
/// ```
/// use quire::RequestDescriptor;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let request = RequestDescriptor::post("/v1/sessions")
///     .with_json(&json!({"projectId": "p_1", "name": "draft"}))?
///     .with_idempotency_key("create-draft-7f3a")
///     .with_timeout(Duration::from_secs(5))
///     .with_max_retries(1);
///
/// assert_eq!(request.idempotency_key(), Some("create-draft-7f3a"));
/// # Ok::<(), quire::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    timeout: Option<Duration>,
    idempotency_key: Option<String>,
    max_retries: Option<u32>,
}

impl RequestDescriptor {
    /// Creates a descriptor for `method` on `path` (relative to the base URL).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            timeout: None,
            idempotency_key: None,
            max_retries: None,
        }
    }

    /// Creates a `GET` descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a `POST` descriptor.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a `PUT` descriptor.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a `PATCH` descriptor.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a `DELETE` descriptor.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Creates a `HEAD` descriptor.
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Sets the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if `body` cannot be serialized.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            Error::validation(format!("Failed to serialize request body: {}", e)).with_source(e)
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Adds a header. Headers set here win over client defaults.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::validation(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::validation(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Overrides the client timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends an `Idempotency-Key` header, which also makes a `POST` retryable on 5xx.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Overrides the client retry count for this call.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path, relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the JSON body, if one was set.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Returns the per-request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the query parameters in insertion order.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Returns the timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the idempotency key, if any.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Returns the retry count override, if any.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }
}
