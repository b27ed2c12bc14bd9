//! Response wrapper that keeps the decoded payload together with HTTP metadata.
//!
//! [`Client::execute_with_headers`](crate::Client::execute_with_headers)
//! returns a [`Response`], which is how callers reach the `ETag` and other
//! headers of a successful call.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful (2xx or 304) response.
///
/// # Examples
///
/// ```no_run
/// use quire::{Client, RequestDescriptor};
///
/// # async fn example() -> Result<(), quire::Error> {
/// let client = Client::builder().api_key("qk_live_123").build()?;
///
/// let response = client
///     .execute_with_headers::<serde_json::Value>(RequestDescriptor::get("/v1/sessions/s_1"))
///     .await?;
///
/// println!("etag: {:?}", response.etag());
/// println!("took {:?} over {} attempt(s)", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded payload. `null`-shaped for 204 and 304 responses.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt until the final response, including backoff.
    pub latency: Duration,

    /// Number of attempts made; `1` when no retry was needed.
    pub attempts: u32,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the payload to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quire::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(42, StatusCode::OK, HeaderMap::new(), Duration::ZERO, 1);
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns `true` for a 304 response to a conditional request.
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quire::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("etag", HeaderValue::from_static("\"abc\""));
    ///
    /// let response = Response::new((), StatusCode::OK, headers, Duration::ZERO, 1);
    /// assert_eq!(response.header("etag"), Some("\"abc\""));
    /// assert_eq!(response.etag(), Some("\"abc\""));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the `ETag` validator, if the server sent one.
    pub fn etag(&self) -> Option<&str> {
        self.header(http::header::ETAG.as_str())
    }

    /// Returns the server-assigned request id, if present.
    pub fn request_id(&self) -> Option<String> {
        crate::classify::request_id(&self.headers)
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// Payload returned for `HEAD` requests, which carry no body.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeadInfo {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers, lower-cased, with non-UTF-8 values skipped.
    pub headers: std::collections::BTreeMap<String, String>,
}
