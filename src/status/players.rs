// src/status/players.rs
use log::debug;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::models::server::Player;

/// Live player list published by BlueMap for the default world.
pub const SUPPLEMENTAL_PLAYERS_PATH: &str = "/maps/world/live/players.json";

#[derive(Deserialize)]
struct MapPlayers {
    #[serde(default)]
    players: Vec<MapPlayer>,
}

#[derive(Deserialize)]
struct MapPlayer {
    name: String,
    #[serde(default)]
    uuid: String,
}

pub fn supplemental_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), SUPPLEMENTAL_PLAYERS_PATH)
}

/// Best-effort second player source. Every failure degrades to an empty
/// list.
pub struct SupplementalPlayerFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl SupplementalPlayerFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn fetch(&self, base_url: &str) -> Vec<Player> {
        let url = supplemental_url(base_url);
        match tokio::time::timeout(self.timeout, self.try_fetch(&url)).await {
            Ok(Ok(players)) => {
                debug!("Fetched {} players from {}", players.len(), url);
                players
            }
            Ok(Err(e)) => {
                debug!("Supplemental player fetch from {} failed: {}", url, e);
                Vec::new()
            }
            Err(_) => {
                debug!("Supplemental player fetch from {} timed out after {:?}", url, self.timeout);
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<Player>, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: MapPlayers = response.json().await?;

        Ok(body
            .players
            .into_iter()
            .map(|p| Player::new(p.name, Some(p.uuid)))
            .collect())
    }
}

/// Protocol players first, all of them and in order, then supplemental
/// players whose name has not been seen yet. Identity is the name alone.
pub fn merge_players(protocol: Vec<Player>, supplemental: Vec<Player>) -> Vec<Player> {
    let mut seen: HashSet<String> = protocol.iter().map(|p| p.name.clone()).collect();
    let mut merged = protocol;

    for player in supplemental {
        if seen.insert(player.name.clone()) {
            merged.push(player);
        }
    }
    merged
}
