//! Session search over GraphQL.

use super::sessions::Session;
use crate::{Client, Error, Result};
use serde::{Deserialize, Serialize};

/// Field of `data` the search query answers under.
pub const SEARCH_SESSIONS_KEY: &str = "searchSessions";

/// GraphQL document sent by [`Search::search_sessions`].
pub const SEARCH_SESSIONS_QUERY: &str = r#"query SearchSessions($input: SearchSessionsInput!) {
  searchSessions(input: $input) {
    total
    nextCursor
    items {
      id
      projectId
      title
      content
      status
      createdAt
      updatedAt
    }
  }
}"#;

/// Search parameters. Unset filters are omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSessionsInput {
    /// Full-text query.
    pub query: String,
    /// Restricts results to one project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// `next_cursor` of the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl SearchSessionsInput {
    /// An unfiltered search for `query`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// One page of search hits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Total matches across all pages.
    pub total: u64,
    /// Matching sessions on this page.
    #[serde(default)]
    pub items: Vec<Session>,
    /// Cursor for the next page; `None` on the last one.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Search operations, borrowed from a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct Search<'a> {
    client: &'a Client,
}

impl<'a> Search<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Searches sessions.
    ///
    /// Fails with a `Graphql` error if the server reports any error, even
    /// when it also returned partial results.
    pub async fn search_sessions(&self, input: &SearchSessionsInput) -> Result<SearchResults> {
        if input.query.trim().is_empty() {
            return Err(Error::validation("Search query must not be empty"));
        }

        let variables = serde_json::json!({ "input": input });
        self.client
            .graphql(SEARCH_SESSIONS_QUERY, Some(variables), SEARCH_SESSIONS_KEY)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_serializes_camel_case() {
        let input = SearchSessionsInput {
            project_id: Some("p_1".to_string()),
            ..SearchSessionsInput::new("standup")
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"query": "standup", "projectId": "p_1"})
        );
    }
}
