//! The request executor.
//!
//! [`Client`] turns a [`RequestDescriptor`] into a network operation:
//! it resolves the URL, builds the headers, bounds every attempt with a
//! timeout, classifies failures, retries what is safe to retry, and merges
//! concurrent identical `GET`s. Use [`ClientBuilder`] to configure one.

use crate::{
    cache::ResponseCache,
    classify::classify,
    config::{
        CacheConfig, DebugConfig, API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
    },
    dedup::Deduplicator,
    error::ErrorContext,
    observer::{redact_headers, redact_json, redact_url, CacheAction, Category, DebugEvent, Observer},
    request::RequestDescriptor,
    response::{HeadInfo, Response},
    retry::{self, Backoff, DEFAULT_MAX_RETRIES},
    Error, Result,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE, IF_NONE_MATCH};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use url::Url;

const SDK_NAME: &str = "quire-rust";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
const SDK_LANGUAGE: &str = "rust";
const IDEMPOTENCY_KEY: &str = "idempotency-key";
const MAX_LOGGED_BODY: usize = 2048;

/// A client for the Quire API.
///
/// Cloning is cheap and clones share the connection pool, response cache
/// and in-flight request table. Separately built clients share nothing.
///
/// # Examples
///
/// ```no_run
/// use quire::{Client, RequestDescriptor};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Project {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), quire::Error> {
/// let client = Client::builder()
///     .api_key("qk_live_123")
///     .timeout(Duration::from_secs(10))
///     .max_retries(2)
///     .build()?;
///
/// let project: Project = client.get("/v1/projects/p_1").await?;
/// println!("{} ({})", project.name, project.id);
///
/// let response = client
///     .execute_with_headers::<Project>(RequestDescriptor::get("/v1/projects/p_1"))
///     .await?;
/// println!("etag: {:?}", response.etag());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    authorization: HeaderValue,
    default_headers: HeaderMap,
    timeout: Duration,
    max_retries: u32,
    backoff: Backoff,
    cache: Option<ResponseCache>,
    dedup: Option<Deduplicator<RawResponse>>,
    observer: Observer,
}

/// A successful exchange before it is decoded into a caller's type.
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    payload: serde_json::Value,
    latency: Duration,
    attempts: u32,
}

/// What came back from one attempt.
struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

#[derive(Debug, Clone, Copy)]
enum Variant {
    Plain,
    WithHeaders,
}

impl Client {
    /// Creates a `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client with default settings and the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Creates a client with default settings, reading the key from `QUIRE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    /// Performs a request and decodes the payload.
    ///
    /// `204` and `304` responses decode from `null`, so use `()`,
    /// `Option<_>` or `serde_json::Value` for endpoints that return them.
    pub async fn execute<T>(&self, request: RequestDescriptor) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let raw = self.dispatch(request, Variant::Plain).await?;
        decode(raw).map(|response| response.data)
    }

    /// Performs a request and returns the payload with status, headers and timing.
    pub async fn execute_with_headers<T>(&self, request: RequestDescriptor) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let raw = self.dispatch(request, Variant::WithHeaders).await?;
        decode(raw)
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::get(path)).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::post(path).with_json(body)?)
            .await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::put(path).with_json(body)?)
            .await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::patch(path).with_json(body)?)
            .await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.execute(RequestDescriptor::delete(path)).await
    }

    /// Makes a HEAD request and returns the status and headers.
    pub async fn head(&self, path: impl Into<String>) -> Result<HeadInfo> {
        self.execute(RequestDescriptor::head(path)).await
    }

    /// Returns the response cache, unless caching is disabled.
    pub fn cache(&self) -> Option<&ResponseCache> {
        self.inner.cache.as_ref()
    }

    /// Removes every cached response.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.clear();
            self.emit_cache(CacheAction::Invalidate, "*");
        }
    }

    /// Removes cached responses whose keys match `pattern`. Returns how many were removed.
    pub fn invalidate_cache(&self, pattern: &Regex) -> usize {
        let Some(cache) = &self.inner.cache else {
            return 0;
        };
        let removed = cache.invalidate_pattern(pattern);
        self.emit_cache(CacheAction::Invalidate, pattern.as_str());
        removed
    }

    /// Returns the base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn emit_cache(&self, action: CacheAction, key: &str) {
        self.inner.observer.emit(Category::Cache, || DebugEvent::Cache {
            action,
            key: key.to_string(),
        });
    }

    /// Routes GETs through the deduplicator; everything else runs directly.
    async fn dispatch(&self, request: RequestDescriptor, variant: Variant) -> Result<RawResponse> {
        let url = self.resolve_url(&request);

        let dedup = match &self.inner.dedup {
            Some(dedup) if *request.method() == Method::GET => dedup,
            _ => return self.run(request, url).await,
        };

        let mut key = format!("GET:{}", url);
        if let Variant::WithHeaders = variant {
            key.push_str(":with-headers");
        }
        if let Some(etag) = request
            .headers()
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
        {
            key.push_str(":if-none-match=");
            key.push_str(etag);
        }

        let client = self.clone();
        dedup
            .dedupe(key, move || async move { client.run(request, url).await })
            .await
    }

    /// Runs one logical call: attempts, classification, backoff.
    async fn run(&self, request: RequestDescriptor, url: Url) -> Result<RawResponse> {
        let method = request.method().clone();
        let timeout = request.timeout().unwrap_or(self.inner.timeout);
        let max_retries = request.max_retries().unwrap_or(self.inner.max_retries);
        let has_idempotency_key = request.idempotency_key().is_some();
        let headers = self.build_headers(&request)?;
        let shown_url = redact_url(&url);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            tracing::debug!(
                method = %method,
                url = %shown_url,
                attempt = attempt,
                "Executing HTTP request"
            );
            self.inner.observer.emit(Category::Request, || DebugEvent::Request {
                method: method.to_string(),
                url: shown_url.clone(),
                attempt,
                headers: redact_headers(&headers),
                body: request.body().map(redact_json),
            });

            let outcome = tokio::time::timeout(
                timeout,
                self.send_once(&method, &url, &headers, request.body()),
            )
            .await;

            let context = || {
                ErrorContext::new(method.as_str(), shown_url.as_str())
                    .with_duration(started.elapsed())
                    .with_retry_count(attempt)
            };

            let (error, will_retry) = match outcome {
                Ok(Ok(reply)) => {
                    self.inner.observer.emit(Category::Response, || DebugEvent::Response {
                        method: method.to_string(),
                        url: shown_url.clone(),
                        attempt,
                        status: reply.status.as_u16(),
                        headers: redact_headers(&reply.headers),
                    });

                    if reply.status.is_success() || reply.status == StatusCode::NOT_MODIFIED {
                        let latency = started.elapsed();
                        tracing::info!(
                            status = reply.status.as_u16(),
                            latency_ms = latency.as_millis(),
                            attempts = attempt + 1,
                            "Received HTTP response"
                        );
                        self.emit_timing(&method, &shown_url, latency, attempt + 1);

                        let payload = payload_of(&method, &reply)
                            .map_err(|e| e.with_context(context()))?;
                        return Ok(RawResponse {
                            status: reply.status,
                            headers: reply.headers,
                            payload,
                            latency,
                            attempts: attempt + 1,
                        });
                    }

                    log_error_status(reply.status, &reply.body);
                    let error = classify(reply.status, &reply.headers, Some(&reply.body), context());
                    let will_retry = attempt < max_retries
                        && retry::should_retry_status(&method, reply.status, has_idempotency_key);
                    (error, will_retry)
                }
                Ok(Err(err)) => {
                    let will_retry = attempt < max_retries && retry::should_retry_transport(&method);
                    let error = if err.is_timeout() {
                        Error::timeout(timeout).with_source(err)
                    } else if attempt > 0 && !will_retry {
                        Error::network(
                            format!("Max retries exceeded after {} attempts: {}", attempt + 1, err),
                            err,
                        )
                    } else {
                        Error::network(format!("Network error: {}", err), err)
                    };
                    (error.with_context(context()), will_retry)
                }
                Err(_elapsed) => {
                    let will_retry = attempt < max_retries && retry::should_retry_transport(&method);
                    (Error::timeout(timeout).with_context(context()), will_retry)
                }
            };

            tracing::warn!(
                error = %error,
                code = error.code(),
                attempt = attempt,
                method = %method,
                path = %request.path(),
                will_retry = will_retry,
                "Request failed"
            );
            self.inner.observer.emit(Category::Error, || DebugEvent::Error {
                method: method.to_string(),
                url: shown_url.clone(),
                attempt,
                code: error.code(),
                message: error.message().to_string(),
                will_retry,
            });

            if !will_retry {
                self.emit_timing(&method, &shown_url, started.elapsed(), attempt + 1);
                return Err(error);
            }

            let delay = self.retry_delay(&error, attempt);
            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Sends one attempt and reads the body it needs.
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&serde_json::Value>,
    ) -> std::result::Result<Reply, reqwest::Error> {
        let mut request = self
            .inner
            .http_client
            .request(method.clone(), url.clone())
            .headers(headers.clone());

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        let body = if *method == Method::HEAD
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            String::new()
        } else {
            response.text().await?
        };

        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    /// Uses the server's `Retry-After` when it gave one, otherwise backoff.
    fn retry_delay(&self, error: &Error, attempt: u32) -> Duration {
        let Some(retry_after) = error.retry_after() else {
            return self.inner.backoff.delay(attempt);
        };

        let wait = retry_after
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        match self.inner.backoff.ceiling() {
            Some(ceiling) => wait.min(ceiling),
            None => wait,
        }
    }

    fn build_headers(&self, request: &RequestDescriptor) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.inner.authorization.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-sdk-name"),
            HeaderValue::from_static(SDK_NAME),
        );
        headers.insert(
            HeaderName::from_static("x-sdk-version"),
            HeaderValue::from_static(SDK_VERSION),
        );
        headers.insert(
            HeaderName::from_static("x-sdk-language"),
            HeaderValue::from_static(SDK_LANGUAGE),
        );

        if let Some(key) = request.idempotency_key() {
            let value = HeaderValue::from_str(key)
                .map_err(|e| Error::validation(format!("Invalid idempotency key: {}", e)))?;
            headers.insert(HeaderName::from_static(IDEMPOTENCY_KEY), value);
        }

        for (name, value) in &self.inner.default_headers {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in request.headers() {
            headers.insert(name.clone(), value.clone());
        }

        Ok(headers)
    }

    fn resolve_url(&self, request: &RequestDescriptor) -> Url {
        let mut url = self.inner.base_url.clone();
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            request.path().trim_start_matches('/')
        );
        url.set_path(&path);

        if !request.query_params().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.query_params() {
                pairs.append_pair(key, value);
            }
        }

        url
    }

    fn emit_timing(&self, method: &Method, url: &str, duration: Duration, attempts: u32) {
        self.inner.observer.emit(Category::Timing, || DebugEvent::Timing {
            method: method.to_string(),
            url: url.to_string(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            attempts,
        });
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_key", &crate::observer::REDACTED)
            .field("timeout", &self.inner.timeout)
            .field("max_retries", &self.inner.max_retries)
            .field("backoff", &self.inner.backoff)
            .field("cache", &self.inner.cache)
            .field("deduplicate", &self.inner.dedup.is_some())
            .finish()
    }
}

/// Turns a 2xx/304 reply into the JSON payload callers decode from.
fn payload_of(method: &Method, reply: &Reply) -> Result<serde_json::Value> {
    if *method == Method::HEAD {
        let head = HeadInfo {
            status: reply.status.as_u16(),
            headers: reply
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
                })
                .collect(),
        };
        return serde_json::to_value(head)
            .map_err(|e| Error::unknown(None, format!("Failed to encode HEAD response: {}", e)));
    }

    if reply.body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }

    serde_json::from_str(&reply.body).map_err(|e| {
        tracing::error!(
            error = %e,
            raw_response = %truncate(&reply.body),
            "Failed to parse response body"
        );
        Error::unknown(
            Some(reply.status.as_u16()),
            format!("Failed to parse response body as JSON: {}", e),
        )
        .with_details(serde_json::json!({ "raw_body": truncate(&reply.body) }))
        .with_source(e)
    })
}

fn decode<T: DeserializeOwned>(raw: RawResponse) -> Result<Response<T>> {
    let data = serde_json::from_value(raw.payload).map_err(|e| {
        Error::unknown(
            Some(raw.status.as_u16()),
            format!("Response did not match the expected shape: {}", e),
        )
        .with_source(e)
    })?;

    Ok(Response::new(
        data,
        raw.status,
        raw.headers,
        raw.latency,
        raw.attempts,
    ))
}

fn log_error_status(status: StatusCode, body: &str) {
    if status.is_client_error() {
        tracing::error!(
            status = status.as_u16(),
            response = %truncate(body),
            "Client error (4xx)"
        );
    } else if status.is_server_error() {
        tracing::warn!(
            status = status.as_u16(),
            response = %truncate(body),
            "Server error (5xx)"
        );
    }
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_LOGGED_BODY {
        return body;
    }
    let mut end = MAX_LOGGED_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use quire::{Backoff, CacheConfig, ClientBuilder};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), quire::Error> {
/// let client = ClientBuilder::new()
///     .api_key("qk_live_123")
///     .base_url("https://eu.api.quire.dev")?
///     .timeout(Duration::from_secs(10))
///     .max_retries(5)
///     .backoff(Backoff::new(Duration::from_millis(100)))
///     .cache(CacheConfig::builder().max_size(500).build())
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Duration,
    max_retries: u32,
    backoff: Backoff,
    cache: CacheConfig,
    deduplicate: bool,
    debug: DebugConfig,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
            cache: CacheConfig::default(),
            deduplicate: true,
            debug: DebugConfig::default(),
        }
    }

    /// Sets the API key. Falls back to the `QUIRE_API_KEY` environment variable.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(parse_base_url(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::validation(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::validation(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-attempt timeout. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many times a failed request may be retried. Defaults to 3.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff policy between retries.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the response cache configuration.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets whether concurrent identical GETs share one request. Defaults to `true`.
    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Sets the debug event configuration.
    pub fn debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an `Authentication` error if no API key was given or found in
    /// the environment, and a `Validation` error for an invalid base URL.
    pub fn build(self) -> Result<Client> {
        let api_key = match self.api_key {
            Some(key) => key,
            None => std::env::var(API_KEY_ENV).unwrap_or_default(),
        };
        if api_key.trim().is_empty() {
            return Err(Error::authentication(format!(
                "No API key provided; pass one to the builder or set {}",
                API_KEY_ENV
            )));
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| Error::authentication("API key contains invalid characters"))?;
        authorization.set_sensitive(true);

        let base_url = match self.base_url {
            Some(url) => url,
            None => match std::env::var(BASE_URL_ENV) {
                Ok(url) if !url.trim().is_empty() => parse_base_url(url.trim())?,
                _ => parse_base_url(DEFAULT_BASE_URL)?,
            },
        };

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::network(format!("Failed to build HTTP client: {}", e), e)
        })?;

        let cache = self
            .cache
            .enabled
            .then(|| ResponseCache::new(self.cache.max_size, self.cache.default_ttl));
        let dedup = self.deduplicate.then(Deduplicator::new);

        tracing::debug!(
            base_url = %base_url,
            timeout_ms = self.timeout.as_millis(),
            max_retries = self.max_retries,
            cache = cache.is_some(),
            deduplicate = dedup.is_some(),
            "Built API client"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                authorization,
                default_headers: self.default_headers,
                timeout: self.timeout,
                max_retries: self.max_retries,
                backoff: self.backoff,
                cache,
                dedup,
                observer: Observer::new(self.debug),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        Error::validation(format!("Invalid base URL '{}': {}", raw, e)).with_source(e)
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(Error::validation(format!(
            "Base URL must be an http(s) URL, got '{}'",
            raw
        )));
    }
    Ok(url)
}
