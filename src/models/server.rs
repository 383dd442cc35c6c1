// src/models/server.rs
use serde::{Deserialize, Serialize};

/// A player as shown in a status sample. Two players are the same entry in a
/// merged sample when their names match, regardless of `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Player {
    pub fn new(name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            name: name.into(),
            id: id.filter(|id| !id.is_empty()),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// A configured server as held by the registry. Read-only to everything
/// outside `storage::memory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "blueMapUrl", skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl ServerRecord {
    /// The configured map backend, if any. Blank values count as unset.
    pub fn map_backend(&self) -> Option<&str> {
        self.map_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
