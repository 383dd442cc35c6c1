// src/status/querier.rs
use chrono::Utc;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::models::server::Player;
use crate::models::status::StatusSnapshot;
use crate::status::protocol::{ProtocolResponse, QueryError, StatusProtocol};
use crate::status::resolver::ResolvedEndpoint;

pub struct StatusQuerier {
    protocol: Arc<dyn StatusProtocol>,
    timeout: Duration,
}

impl StatusQuerier {
    pub fn new(protocol: Arc<dyn StatusProtocol>, timeout: Duration) -> Self {
        Self { protocol, timeout }
    }

    /// Runs the status exchange within the configured budget. The budget is
    /// enforced here as well as handed to the protocol, so an implementation
    /// that ignores it still cannot hang the caller.
    pub async fn query(&self, endpoint: &ResolvedEndpoint) -> Result<ProtocolResponse, QueryError> {
        debug!("Querying {} ({:?})", endpoint, endpoint.source);
        let exchange = self.protocol.query(&endpoint.host, endpoint.port, self.timeout);
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(self.timeout)),
        }
    }
}

/// Builds the snapshot for a successful query. Counts always come from the
/// protocol response; `sample` is the already merged player list.
pub fn online_snapshot(response: ProtocolResponse, sample: Vec<Player>) -> StatusSnapshot {
    StatusSnapshot {
        online: true,
        motd: response.motd,
        players: response.online_players.unwrap_or(0),
        max_players: response.max_players.unwrap_or(0),
        sample_players: sample,
        version: response.version_name,
        protocol: response.protocol,
        favicon: response.favicon,
        last_updated: Utc::now(),
        error: None,
    }
}

pub fn failed_snapshot(error: &QueryError) -> StatusSnapshot {
    StatusSnapshot::offline(error.to_string())
}
