// src/models/status.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::server::Player;

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Point-in-time view of one server. Built once per query and never mutated
/// afterwards; the cache hands out shared references to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub online: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub motd: String,
    pub players: i64,
    pub max_players: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_players: Vec<Player>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub protocol: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            online: false,
            motd: String::new(),
            players: 0,
            max_players: 0,
            sample_players: Vec::new(),
            version: String::new(),
            protocol: 0,
            favicon: None,
            last_updated: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn disabled() -> Self {
        Self::offline("Server is currently disabled.")
    }
}
