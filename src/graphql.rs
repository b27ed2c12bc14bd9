//! GraphQL request envelopes and response inspection.
//!
//! A GraphQL server reports query failures inside a 2xx body, so HTTP
//! classification alone cannot catch them. Any non-empty `errors` array
//! fails the call, even when partial `data` came back with it.

use crate::{Client, Error, RequestDescriptor, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Path GraphQL requests are posted to.
pub const GRAPHQL_PATH: &str = "/graphql";

/// Location of an error within the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    /// Line number (1-based).
    pub line: u32,
    /// Column number (1-based).
    pub column: u32,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlErrorItem {
    /// Human-readable message.
    pub message: String,
    /// Where in the query text the error applies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphqlErrorLocation>,
    /// Response path of the failing field; segments are names or indices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    /// Server-specific extra information, such as an error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl GraphqlErrorItem {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }
}

/// Request body for a GraphQL call.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<'a> {
    /// The query document.
    pub query: &'a str,
    /// Variables referenced by the query, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<&'a serde_json::Value>,
}

/// Top-level shape of a GraphQL response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlEnvelope {
    /// Query result; may be partial when `errors` is non-empty.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Reported errors. An absent or `null` array reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<GraphqlErrorItem>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<GraphqlErrorItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<GraphqlErrorItem>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GraphqlEnvelope {
    /// Returns the value under `data.<data_key>`, or fails.
    ///
    /// # Errors
    ///
    /// - `Graphql` if `errors` is non-empty, carrying the errors, `query` and
    ///   `variables`. Partial data is discarded.
    /// - `Unknown` ("no data returned") if `data.<data_key>` is absent or null.
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::graphql::GraphqlEnvelope;
    /// use quire::ErrorKind;
    /// use serde_json::json;
    ///
    /// let envelope: GraphqlEnvelope = serde_json::from_value(json!({
    ///     "data": {"searchSessions": {"total": 1}},
    ///     "errors": [{"message": "index is stale"}]
    /// })).unwrap();
    ///
    /// let err = envelope.into_data("searchSessions", "{ ... }", None).unwrap_err();
    /// assert!(matches!(err.kind(), ErrorKind::Graphql { errors, .. } if errors.len() == 1));
    /// ```
    pub fn into_data(
        self,
        data_key: &str,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if !self.errors.is_empty() {
            tracing::warn!(
                errors = self.errors.len(),
                partial_data = self.data.is_some(),
                "GraphQL response carried errors"
            );
            return Err(Error::graphql(self.errors, query, variables));
        }

        match self.data {
            Some(serde_json::Value::Object(mut data)) => match data.remove(data_key) {
                Some(value) if !value.is_null() => Ok(value),
                _ => Err(no_data(data_key)),
            },
            _ => Err(no_data(data_key)),
        }
    }
}

fn no_data(data_key: &str) -> Error {
    Error::unknown(None, format!("No data returned for '{}'", data_key))
        .with_details(serde_json::json!({ "data_key": data_key }))
}

impl Client {
    /// Runs a GraphQL query and decodes `data.<data_key>` into `T`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quire::Client;
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), quire::Error> {
    /// let client = Client::builder().api_key("qk_live_123").build()?;
    ///
    /// let count: u64 = client
    ///     .graphql(
    ///         "query($p: ID!) { sessionCount(projectId: $p) }",
    ///         Some(json!({"p": "p_1"})),
    ///         "sessionCount",
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn graphql<T>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
        data_key: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = RequestDescriptor::post(GRAPHQL_PATH).with_json(&GraphqlRequest {
            query,
            variables: variables.as_ref(),
        })?;

        let envelope: GraphqlEnvelope = self.execute(request).await?;
        let data = envelope.into_data(data_key, query, variables)?;

        serde_json::from_value(data).map_err(|e| {
            Error::unknown(
                None,
                format!("GraphQL data for '{}' did not match the expected shape: {}", data_key, e),
            )
            .with_source(e)
        })
    }
}
