//! ETag-validated reads backed by the response cache.

use crate::{
    cache::SetOptions, observer::CacheAction, Client, Error, RequestDescriptor, Result,
};
use http::header::IF_NONE_MATCH;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Where a conditional read keeps its payload, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Cache key for the logical resource, e.g. `session:s_1`.
    pub key: String,
    /// TTL for the stored payload. `None` uses the cache default.
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    /// A policy storing under `key` with the cache's default TTL.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
        }
    }

    /// Sets the TTL for stored payloads.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A payload together with the validator it was served with.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The payload.
    pub data: T,
    /// The `ETag` the payload was served with, if the server sent one.
    pub etag: Option<String>,
}

impl Client {
    /// Reads `path`, revalidating with an ETag when one is known.
    ///
    /// With an explicit `etag`, a `304` means the caller's copy is current
    /// and `Ok(None)` is returned. Without one, the validator stored under
    /// `policy.key` is sent and a `304` returns the cached payload, or
    /// `Ok(None)` if that entry was evicted in the meantime. Any fresh 2xx
    /// payload replaces the cache entry.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quire::conditional::CachePolicy;
    /// use quire::Client;
    ///
    /// # async fn example() -> Result<(), quire::Error> {
    /// let client = Client::builder().api_key("qk_live_123").build()?;
    /// let policy = CachePolicy::new("session:s_1");
    ///
    /// let first = client
    ///     .get_conditional::<serde_json::Value>("/v1/sessions/s_1", &policy, None)
    ///     .await?;
    /// let etag = first.as_ref().and_then(|v| v.etag.clone());
    ///
    /// // `None` here means the copy we hold is still current.
    /// let again = client
    ///     .get_conditional::<serde_json::Value>("/v1/sessions/s_1", &policy, etag.as_deref())
    ///     .await?;
    /// assert!(again.is_none());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_conditional<T>(
        &self,
        path: impl Into<String>,
        policy: &CachePolicy,
        etag: Option<&str>,
    ) -> Result<Option<Versioned<T>>>
    where
        T: DeserializeOwned,
    {
        let validator = match etag {
            Some(etag) => Some(etag.to_string()),
            None => self.cached_validator(&policy.key),
        };

        let mut request = RequestDescriptor::get(path);
        if let Some(validator) = &validator {
            request = request.with_header(IF_NONE_MATCH.as_str(), validator)?;
        }

        let response = self
            .execute_with_headers::<serde_json::Value>(request)
            .await?;

        if response.is_not_modified() {
            self.emit_cache(CacheAction::NotModified, &policy.key);
            if etag.is_some() {
                return Ok(None);
            }

            let Some(cache) = self.cache() else {
                return Ok(None);
            };
            return match cache.get(&policy.key) {
                Some(data) => Ok(Some(Versioned {
                    data: decode(data, &policy.key)?,
                    etag: validator,
                })),
                None => {
                    tracing::debug!(key = %policy.key, "cached payload evicted before 304 arrived");
                    Ok(None)
                }
            };
        }

        let fresh_etag = response.etag().map(str::to_string);
        if let Some(cache) = self.cache() {
            let options = SetOptions {
                etag: fresh_etag.clone(),
                ttl: policy.ttl,
            };
            cache.set(policy.key.clone(), response.data.clone(), options);
            self.emit_cache(CacheAction::Store, &policy.key);
        }

        Ok(Some(Versioned {
            data: decode(response.data, &policy.key)?,
            etag: fresh_etag,
        }))
    }

    fn cached_validator(&self, key: &str) -> Option<String> {
        let cache = self.cache()?;
        match cache.get_entry(key) {
            Some(entry) => {
                self.emit_cache(CacheAction::Hit, key);
                entry.etag
            }
            None => {
                self.emit_cache(CacheAction::Miss, key);
                None
            }
        }
    }
}

fn decode<T: DeserializeOwned>(data: serde_json::Value, key: &str) -> Result<T> {
    serde_json::from_value(data).map_err(|e| {
        Error::unknown(
            None,
            format!("Payload for '{}' did not match the expected shape: {}", key, e),
        )
        .with_source(e)
    })
}
