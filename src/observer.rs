//! Debug events and credential redaction.

use crate::config::DebugConfig;
use http::HeaderMap;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use url::form_urlencoded::byte_serialize;
use url::Url;

/// Replacement text for redacted values.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADERS: [&str; 5] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

fn secret_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(authorization|api[-_]?key|token|secret|password|passwd|credential|cookie|private[-_]?key)",
        )
        .expect("secret name pattern is valid")
    })
}

/// Returns `true` if a header or field called `name` may hold a credential.
pub fn is_sensitive_name(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|header| header.eq_ignore_ascii_case(name))
        || secret_name_pattern().is_match(name)
}

/// Copies `headers` into a printable map with credentials masked.
pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_name(name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Returns a copy of `value` with every field whose name looks secret masked.
///
/// # Examples
///
/// ```
/// use quire::observer::redact_json;
/// use serde_json::json;
///
/// let body = json!({"name": "demo", "auth": {"apiKey": "qk_live_123"}});
/// assert_eq!(
///     redact_json(&body),
///     json!({"name": "demo", "auth": {"apiKey": "[REDACTED]"}})
/// );
/// ```
pub fn redact_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let value = if is_sensitive_name(key) {
                    serde_json::Value::String(REDACTED.to_string())
                } else {
                    redact_json(value)
                };
                (key.clone(), value)
            })
            .collect(),
        serde_json::Value::Array(items) => items.iter().map(redact_json).collect(),
        other => other.clone(),
    }
}

/// Renders `url` with the values of secret-looking query parameters masked.
///
/// # Examples
///
/// ```
/// use quire::observer::redact_url;
/// use url::Url;
///
/// let url = Url::parse("https://api.quire.dev/v1/projects?limit=5&api_key=qk_live_123").unwrap();
/// assert_eq!(
///     redact_url(&url),
///     "https://api.quire.dev/v1/projects?limit=5&api_key=[REDACTED]"
/// );
/// ```
pub fn redact_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }

    let query = url
        .query_pairs()
        .map(|(name, value)| {
            let name_part: String = byte_serialize(name.as_bytes()).collect();
            if is_sensitive_name(&name) {
                format!("{}={}", name_part, REDACTED)
            } else {
                let value_part: String = byte_serialize(value.as_bytes()).collect();
                format!("{}={}", name_part, value_part)
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    format!("{}?{}", base, query)
}

/// What happened in the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheAction {
    /// A live entry supplied a validator or payload.
    Hit,
    /// No live entry was found.
    Miss,
    /// A fresh payload was stored.
    Store,
    /// The server confirmed the cached payload is current.
    NotModified,
    /// Entries were removed explicitly.
    Invalidate,
}

/// A debug event. Header maps and bodies are already redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebugEvent {
    Request {
        method: String,
        url: String,
        attempt: u32,
        headers: BTreeMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<serde_json::Value>,
    },
    Response {
        method: String,
        url: String,
        attempt: u32,
        status: u16,
        headers: BTreeMap<String, String>,
    },
    Error {
        method: String,
        url: String,
        attempt: u32,
        code: &'static str,
        message: String,
        will_retry: bool,
    },
    Cache {
        action: CacheAction,
        key: String,
    },
    Timing {
        method: String,
        url: String,
        duration_ms: u64,
        attempts: u32,
    },
}

/// Which toggle governs an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Category {
    Request,
    Response,
    Error,
    Cache,
    Timing,
}

/// Dispatches debug events according to a [`DebugConfig`].
pub(crate) struct Observer {
    config: DebugConfig,
}

impl Observer {
    pub(crate) fn new(config: DebugConfig) -> Self {
        Self { config }
    }

    fn wants(&self, category: Category) -> bool {
        self.config.enabled
            && match category {
                Category::Request => self.config.log_requests,
                Category::Response => self.config.log_responses,
                Category::Error => self.config.log_errors,
                Category::Cache => self.config.log_cache,
                Category::Timing => self.config.log_timing,
            }
    }

    /// Builds and dispatches an event if its category is enabled.
    pub(crate) fn emit(&self, category: Category, build: impl FnOnce() -> DebugEvent) {
        if !self.wants(category) {
            return;
        }

        let event = build();
        match &self.config.sink {
            Some(sink) => sink(&event),
            None => tracing::debug!(target: "quire::debug", event = ?event, "debug event"),
        }
    }
}
