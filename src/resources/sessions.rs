//! `/v1/sessions`, with ETag-validated reads.
//!
//! Reads go through [`Client::get_conditional`] under the cache key
//! `session:{id}`. Updates and deletes drop that entry.

use super::{check_id, Page};
use crate::conditional::{CachePolicy, Versioned};
use crate::{Client, RequestDescriptor, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SESSIONS_PATH: &str = "/v1/sessions";

/// How long a session read stays in the cache.
pub const SESSION_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A recorded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Server-assigned id.
    pub id: String,
    /// The owning project.
    pub project_id: String,
    /// Display title.
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub content: Option<String>,
    /// Server-defined lifecycle state, e.g. `active`.
    #[serde(default)]
    pub status: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of a session creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    /// Project the session belongs to.
    pub project_id: String,
    /// Display title. Required.
    pub title: String,
    /// Initial body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Fields left as `None` are not changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSession {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replacement body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New lifecycle state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Session operations, borrowed from a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct Sessions<'a> {
    client: &'a Client,
}

impl<'a> Sessions<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Lists the sessions of a project.
    pub async fn list(&self, project_id: &str) -> Result<Page<Session>> {
        let project_id = check_id("project", project_id)?;
        self.client
            .get(format!("/v1/projects/{}/sessions", project_id))
            .await
    }

    /// Reads a session.
    ///
    /// Pass the ETag of a copy you already hold as `etag`; `Ok(None)` then
    /// means that copy is current. Without it the cached validator is used
    /// and an unchanged session comes back from the cache.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(client: quire::Client) -> Result<(), quire::Error> {
    /// let sessions = client.sessions();
    ///
    /// if let Some(first) = sessions.get("s_1", None).await? {
    ///     let etag = first.etag.clone();
    ///     match sessions.get("s_1", etag.as_deref()).await? {
    ///         None => println!("unchanged: {}", first.data.title),
    ///         Some(newer) => println!("changed: {}", newer.data.title),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, id: &str, etag: Option<&str>) -> Result<Option<Versioned<Session>>> {
        let id = check_id("session", id)?;
        let policy = CachePolicy::new(cache_key(id)).with_ttl(SESSION_CACHE_TTL);
        self.client
            .get_conditional(format!("{}/{}", SESSIONS_PATH, id), &policy, etag)
            .await
    }

    /// Creates a session. With an `idempotency_key` the call is safe to retry.
    pub async fn create(
        &self,
        input: &CreateSession,
        idempotency_key: Option<&str>,
    ) -> Result<Session> {
        let mut request = RequestDescriptor::post(SESSIONS_PATH).with_json(input)?;
        if let Some(key) = idempotency_key {
            request = request.with_idempotency_key(key);
        }
        self.client.execute(request).await
    }

    /// Applies a partial update and drops the cached copy.
    pub async fn update(&self, id: &str, input: &UpdateSession) -> Result<Session> {
        let id = check_id("session", id)?;
        let session = self
            .client
            .patch(format!("{}/{}", SESSIONS_PATH, id), input)
            .await;
        self.forget(id);
        session
    }

    /// Deletes a session and drops the cached copy.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = check_id("session", id)?;
        let outcome = self
            .client
            .delete::<serde_json::Value>(format!("{}/{}", SESSIONS_PATH, id))
            .await;
        self.forget(id);
        outcome.map(|_| ())
    }

    /// Drops the cached copy even if the write failed; its outcome is unknown.
    fn forget(&self, id: &str) {
        let key = cache_key(id);
        if let Some(cache) = self.client.cache() {
            if cache.delete(&key) {
                self.client
                    .emit_cache(crate::observer::CacheAction::Invalidate, &key);
            }
        }
    }
}

fn cache_key(id: &str) -> String {
    format!("session:{}", id)
}
