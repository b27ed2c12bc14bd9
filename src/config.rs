//! Cache and debug configuration.
//!
//! Both follow the same pattern: a plain struct with sensible defaults and
//! a builder for selective overrides.

use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::observer::DebugEvent;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "QUIRE_API_KEY";

/// Environment variable consulted when no base URL is configured.
pub const BASE_URL_ENV: &str = "QUIRE_BASE_URL";

/// Base URL used when neither the builder nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "https://api.quire.dev";

/// Per-attempt timeout used when neither client nor request sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the per-client response cache.
///
/// # Examples
///
/// ```
/// use quire::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::builder()
///     .max_size(500)
///     .default_ttl(Duration::from_secs(120))
///     .build();
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the client keeps a response cache at all.
    pub enabled: bool,

    /// Maximum number of entries before least-recently-used eviction.
    pub max_size: usize,

    /// TTL for entries stored without an explicit one. Defaults to 60 seconds.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    /// Creates a new builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Creates a configuration with caching turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Builder for `CacheConfig`.
#[derive(Default)]
pub struct CacheConfigBuilder {
    enabled: Option<bool>,
    max_size: Option<usize>,
    default_ttl: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Sets whether caching is enabled.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets the maximum number of entries.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Sets the default TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Builds the `CacheConfig`.
    pub fn build(self) -> CacheConfig {
        let default = CacheConfig::default();
        CacheConfig {
            enabled: self.enabled.unwrap_or(default.enabled),
            max_size: self.max_size.unwrap_or(default.max_size),
            default_ttl: self.default_ttl.unwrap_or(default.default_ttl),
        }
    }
}

/// Callback receiving debug events.
pub type DebugSink = Arc<dyn Fn(&DebugEvent) + Send + Sync>;

/// Configuration for debug events.
///
/// When enabled, the client reports each request, response, error, cache
/// decision and timing summary that its toggles allow. Events go to `sink`
/// if one is set, otherwise to `tracing` at debug level. Credentials are
/// always redacted first.
///
/// # Examples
///
/// ```
/// use quire::DebugConfig;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink_seen = Arc::clone(&seen);
///
/// let config = DebugConfig::builder()
///     .log_responses(false)
///     .sink(move |event| sink_seen.lock().unwrap().push(format!("{event:?}")))
///     .build();
/// assert!(config.enabled && config.log_requests && !config.log_responses);
/// ```
#[derive(Clone)]
pub struct DebugConfig {
    /// Master switch.
    pub enabled: bool,
    /// Report outgoing requests.
    pub log_requests: bool,
    /// Report received responses.
    pub log_responses: bool,
    /// Report failed attempts.
    pub log_errors: bool,
    /// Report cache hits, misses and stores.
    pub log_cache: bool,
    /// Report a timing summary per logical call.
    pub log_timing: bool,
    /// Where events go. `None` routes them to `tracing`.
    pub sink: Option<DebugSink>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_requests: true,
            log_responses: true,
            log_errors: true,
            log_cache: true,
            log_timing: true,
            sink: None,
        }
    }
}

impl std::fmt::Debug for DebugConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugConfig")
            .field("enabled", &self.enabled)
            .field("log_requests", &self.log_requests)
            .field("log_responses", &self.log_responses)
            .field("log_errors", &self.log_errors)
            .field("log_cache", &self.log_cache)
            .field("log_timing", &self.log_timing)
            .field("sink", &self.sink.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl DebugConfig {
    /// Creates a builder. Building enables debugging unless told otherwise.
    pub fn builder() -> DebugConfigBuilder {
        DebugConfigBuilder::default()
    }
}

/// Builder for `DebugConfig`.
#[derive(Default)]
pub struct DebugConfigBuilder {
    enabled: Option<bool>,
    log_requests: Option<bool>,
    log_responses: Option<bool>,
    log_errors: Option<bool>,
    log_cache: Option<bool>,
    log_timing: Option<bool>,
    sink: Option<DebugSink>,
}

impl DebugConfigBuilder {
    /// Sets the master switch.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Reports outgoing requests.
    pub fn log_requests(mut self, on: bool) -> Self {
        self.log_requests = Some(on);
        self
    }

    /// Reports received responses.
    pub fn log_responses(mut self, on: bool) -> Self {
        self.log_responses = Some(on);
        self
    }

    /// Reports failed attempts.
    pub fn log_errors(mut self, on: bool) -> Self {
        self.log_errors = Some(on);
        self
    }

    /// Reports cache decisions.
    pub fn log_cache(mut self, on: bool) -> Self {
        self.log_cache = Some(on);
        self
    }

    /// Reports a timing summary per call.
    pub fn log_timing(mut self, on: bool) -> Self {
        self.log_timing = Some(on);
        self
    }

    /// Routes events to `sink` instead of `tracing`.
    pub fn sink(mut self, sink: impl Fn(&DebugEvent) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Builds the `DebugConfig`.
    pub fn build(self) -> DebugConfig {
        let default = DebugConfig::default();
        DebugConfig {
            enabled: self.enabled.unwrap_or(true),
            log_requests: self.log_requests.unwrap_or(default.log_requests),
            log_responses: self.log_responses.unwrap_or(default.log_responses),
            log_errors: self.log_errors.unwrap_or(default.log_errors),
            log_cache: self.log_cache.unwrap_or(default.log_cache),
            log_timing: self.log_timing.unwrap_or(default.log_timing),
            sink: self.sink,
        }
    }
}
