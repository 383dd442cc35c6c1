// src/status/mod.rs
pub mod players;
pub mod protocol;
pub mod querier;
pub mod resolver;

use log::{debug, warn};
use std::sync::Arc;

use crate::models::server::ServerRecord;
use crate::models::status::StatusSnapshot;
use crate::storage::cache::StatusCache;
use players::{merge_players, SupplementalPlayerFetcher};
use querier::{failed_snapshot, online_snapshot, StatusQuerier};
use resolver::AddressResolver;

/// Serves status requests from the cache and refreshes on a miss.
///
/// Concurrent misses for the same server are not collapsed: each one runs
/// its own resolve/query round trip and the last write wins.
pub struct StatusService {
    cache: Arc<StatusCache>,
    resolver: AddressResolver,
    querier: StatusQuerier,
    fetcher: SupplementalPlayerFetcher,
}

impl StatusService {
    pub fn new(
        cache: Arc<StatusCache>,
        resolver: AddressResolver,
        querier: StatusQuerier,
        fetcher: SupplementalPlayerFetcher,
    ) -> Self {
        Self {
            cache,
            resolver,
            querier,
            fetcher,
        }
    }

    pub fn cached(&self, server_name: &str) -> Option<Arc<StatusSnapshot>> {
        self.cache.get(server_name)
    }

    /// Cached snapshot if fresh, otherwise a new one which is cached before
    /// it is returned. Disabled servers get an offline snapshot without any
    /// network traffic.
    pub async fn status(&self, server: &ServerRecord) -> Arc<StatusSnapshot> {
        if let Some(snapshot) = self.cache.get(&server.name) {
            debug!("Status cache hit for {}", server.name);
            return snapshot;
        }

        let snapshot = if server.enabled {
            Arc::new(self.refresh(server).await)
        } else {
            Arc::new(StatusSnapshot::disabled())
        };
        self.cache.set(&server.name, Arc::clone(&snapshot));
        debug!("Cached status for {} ({} entries)", server.name, self.cache.len());
        snapshot
    }

    async fn refresh(&self, server: &ServerRecord) -> StatusSnapshot {
        let endpoint = self.resolver.resolve(&server.address).await;

        let mut response = match self.querier.query(&endpoint).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Error querying server {} ({}): {}", server.name, server.address, e);
                return failed_snapshot(&e);
            }
        };

        if let Some(latency) = response.latency {
            debug!("{} answered from {} in {:?}", server.name, endpoint, latency);
        }

        let supplemental = match server.map_backend() {
            Some(base_url) => self.fetcher.fetch(base_url).await,
            None => Vec::new(),
        };
        let protocol_sample = std::mem::take(&mut response.sample);
        online_snapshot(response, merge_players(protocol_sample, supplemental))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::server::Player;
    use crate::status::players::tests::serve_once;
    use crate::status::protocol::StatusProtocol;
    use crate::status::querier::tests::{response, ScriptedProtocol};
    use crate::status::resolver::tests::StaticLookup;
    use std::time::Duration;

    pub fn service_with(protocol: Arc<dyn StatusProtocol>) -> (StatusService, Arc<StatusCache>) {
        let cache = Arc::new(StatusCache::new(Duration::from_secs(60), Duration::from_secs(10)));
        let service = StatusService::new(
            Arc::clone(&cache),
            AddressResolver::new(Arc::new(StaticLookup::default())),
            StatusQuerier::new(protocol, Duration::from_secs(5)),
            SupplementalPlayerFetcher::new(reqwest::Client::new(), Duration::from_secs(2)),
        );
        (service, cache)
    }

    pub fn server(name: &str) -> ServerRecord {
        ServerRecord {
            name: name.to_string(),
            address: "mc.example.com".to_string(),
            description: None,
            map_url: None,
            enabled: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_negatively_cached() {
        let protocol = Arc::new(ScriptedProtocol::failing("connection refused"));
        let (service, cache) = service_with(protocol.clone());
        let survival = server("Survival");

        let first = service.status(&survival).await;
        assert!(!first.online);
        assert!(first.error.is_some());
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        let second = service.status(&survival).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(protocol.calls(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        service.status(&survival).await;
        assert_eq!(protocol.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn online_status_is_cached_for_a_minute() {
        let protocol = Arc::new(ScriptedProtocol::online(response(vec![Player::new("Alex", None)])));
        let (service, _) = service_with(protocol.clone());
        let survival = server("Survival");

        let snapshot = service.status(&survival).await;
        assert!(snapshot.online);
        assert_eq!(snapshot.players, 1);
        assert_eq!(snapshot.max_players, 20);

        tokio::time::advance(Duration::from_secs(59)).await;
        service.status(&survival).await;
        assert_eq!(protocol.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        service.status(&survival).await;
        assert_eq!(protocol.calls(), 2);
    }

    #[tokio::test]
    async fn disabled_server_is_not_queried() {
        let protocol = Arc::new(ScriptedProtocol::online(response(Vec::new())));
        let (service, cache) = service_with(protocol.clone());
        let mut legacy = server("Legacy");
        legacy.enabled = false;

        let snapshot = service.status(&legacy).await;
        assert!(!snapshot.online);
        assert_eq!(snapshot.error.as_deref(), Some("Server is currently disabled."));
        assert_eq!(protocol.calls(), 0);
        assert!(cache.get("Legacy").is_some());
    }

    #[tokio::test]
    async fn unreachable_map_backend_keeps_protocol_sample() {
        let protocol = Arc::new(ScriptedProtocol::online(response(vec![
            Player::new("A", None),
            Player::new("B", None),
        ])));
        let (service, _) = service_with(protocol);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let mut survival = server("Survival");
        survival.map_url = Some(format!("http://{}", addr));

        let snapshot = service.status(&survival).await;
        assert!(snapshot.online);
        let names: Vec<&str> = snapshot.sample_players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn map_players_extend_sample_but_not_counts() {
        let protocol = Arc::new(ScriptedProtocol::online(response(vec![
            Player::new("A", None),
            Player::new("B", None),
        ])));
        let (service, _) = service_with(protocol);
        let (addr, request) = serve_once(
            "200 OK",
            r#"{"players":[{"name":"B","uuid":"b"},{"name":"C","uuid":"c"},{"name":"D","uuid":"d"}]}"#,
        )
        .await;

        let mut survival = server("Survival");
        survival.map_url = Some(format!("http://{}", addr));

        let snapshot = service.status(&survival).await;
        assert!(snapshot.online);
        let names: Vec<&str> = snapshot.sample_players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_eq!(snapshot.sample_players[1].id, None);
        assert_eq!(snapshot.players, 2);
        assert_eq!(snapshot.max_players, 20);
        assert_eq!(
            request.await.expect("backend task"),
            "GET /maps/world/live/players.json HTTP/1.1"
        );
    }

    // Miss storms are not collapsed into one query; every concurrent miss
    // reaches the server.
    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_each_query_the_server() {
        let protocol = Arc::new(ScriptedProtocol {
            delay: Duration::from_millis(100),
            ..ScriptedProtocol::online(response(Vec::new()))
        });
        let (service, cache) = service_with(protocol.clone());
        let service = Arc::new(service);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            tasks.spawn(async move { service.status(&server("Survival")).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.expect("task").online);
        }

        assert_eq!(protocol.calls(), 8);
        assert_eq!(cache.len(), 1);
    }
}
