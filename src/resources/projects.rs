//! `/v1/projects`.

use super::{check_id, Page};
use crate::{Client, RequestDescriptor, Result};
use serde::{Deserialize, Serialize};

const PROJECTS_PATH: &str = "/v1/projects";

/// A project as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Server-assigned id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of a project creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    /// Display name. Required.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fields left as `None` are not changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Project operations, borrowed from a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct Projects<'a> {
    client: &'a Client,
}

impl<'a> Projects<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Lists all projects.
    pub async fn list(&self) -> Result<Page<Project>> {
        self.client.get(PROJECTS_PATH).await
    }

    /// Reads a project. Fails with `NotFound` if it does not exist.
    pub async fn get(&self, id: &str) -> Result<Project> {
        let id = check_id("project", id)?;
        self.client.get(format!("{}/{}", PROJECTS_PATH, id)).await
    }

    /// Creates a project. With an `idempotency_key` the call is safe to retry.
    pub async fn create(
        &self,
        input: &CreateProject,
        idempotency_key: Option<&str>,
    ) -> Result<Project> {
        let mut request = RequestDescriptor::post(PROJECTS_PATH).with_json(input)?;
        if let Some(key) = idempotency_key {
            request = request.with_idempotency_key(key);
        }
        self.client.execute(request).await
    }

    /// Applies a partial update. Never retried.
    pub async fn update(&self, id: &str, input: &UpdateProject) -> Result<Project> {
        let id = check_id("project", id)?;
        self.client
            .patch(format!("{}/{}", PROJECTS_PATH, id), input)
            .await
    }

    /// Deletes a project.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = check_id("project", id)?;
        self.client
            .delete::<serde_json::Value>(format!("{}/{}", PROJECTS_PATH, id))
            .await?;
        Ok(())
    }
}
