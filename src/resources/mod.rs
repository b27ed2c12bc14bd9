//! Typed facades over the REST and GraphQL endpoints.
//!
//! These are thin: each method builds a [`RequestDescriptor`](crate::RequestDescriptor)
//! and hands it to the [`Client`]. Reach them through
//! [`Client::projects`], [`Client::sessions`] and [`Client::search`].

use crate::{Client, Error, Result};
use serde::{Deserialize, Serialize};

pub mod projects;
pub mod search;
pub mod sessions;

pub use projects::{CreateProject, Project, Projects, UpdateProject};
pub use search::{Search, SearchResults, SearchSessionsInput};
pub use sessions::{CreateSession, Session, Sessions, UpdateSession};

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Cursor for the next page; `None` on the last one.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl Client {
    /// Project operations.
    pub fn projects(&self) -> Projects<'_> {
        Projects::new(self)
    }

    /// Session operations.
    pub fn sessions(&self) -> Sessions<'_> {
        Sessions::new(self)
    }

    /// Full-text search over sessions.
    pub fn search(&self) -> Search<'_> {
        Search::new(self)
    }
}

/// Rejects ids that would change the shape of the request path.
fn check_id<'a>(what: &str, id: &'a str) -> Result<&'a str> {
    if id.trim().is_empty() || id.contains(['/', '?', '#']) {
        return Err(Error::validation(format!("Invalid {} id: {:?}", what, id)));
    }
    Ok(id)
}
